// src/config.rs
use crate::constants::{DEFAULT_GENERATION_ENABLED, DEFAULT_MAGNIFICATION, DEFAULT_PROGRAM};
use crate::mode::{clamp_mode, DEFAULT_MODE};

#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Locator executable, invoked with kpsewhich-compatible arguments
    pub program: String,
    /// Document magnification in thousandths
    pub magnification: u32,
    pub mode: usize,
    pub generation_enabled: bool,
    /// Arguments placed before the generated ones
    pub extra_args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            magnification: DEFAULT_MAGNIFICATION,
            mode: DEFAULT_MODE,
            generation_enabled: DEFAULT_GENERATION_ENABLED,
            extra_args: Vec::new(),
            env: Vec::new(),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    pub fn with_magnification(mut self, magnification: u32) -> Self {
        self.magnification = magnification.max(1);
        self
    }

    pub fn with_mode(mut self, mode: usize) -> Self {
        self.mode = clamp_mode(mode);
        self
    }

    pub fn with_generation(mut self, enabled: bool) -> Self {
        self.generation_enabled = enabled;
        self
    }

    pub fn with_arg(mut self, arg: &str) -> Self {
        self.extra_args.push(arg.to_string());
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }
}
