// src/constants.rs

// Resolver defaults
pub const DEFAULT_PROGRAM: &str = "kpsewhich";
pub const DEFAULT_MAGNIFICATION: u32 = 1000;
pub const DEFAULT_GENERATION_ENABLED: bool = true;

// Process I/O
pub const READ_BUFFER_SIZE: usize = 4096;
pub const PTY_COLS: u16 = 512;
pub const PTY_ROWS: u16 = 24;
pub const MAX_READ_RETRIES: u32 = 3;
pub const READ_RETRY_DELAY_MS: u64 = 100;

/// Upper bound for the rolling MetaFont transcript kept per resolver run
pub const MAX_TRANSCRIPT_LEN: usize = 64 * 1024;

/// TeX fix-word unit: scaled values are multiples of 2^-20
pub const FIX_WORD_UNIT: f64 = 1048576.0;
