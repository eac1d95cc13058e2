//! Command line of the `dvifonts` binary
//!
//! ```text
//! dvifonts [--mode N] [--no-mktex] [--program P] [--mag M] NAME[:CHECKSUM[:SCALE[:DESIGN]]]...
//! ```
//!
//! Checksums are octal, like `tftopl` and `dvitype` print them. Scale and
//! design sizes are in scaled points and default to 10pt.

use fontpool_core::PoolConfig;

use crate::error::{CliError, CliResult};

/// 10pt in scaled points
pub const DEFAULT_SIZE: u32 = 10 << 16;

pub const USAGE: &str = "Usage: dvifonts [--mode N] [--no-mktex] [--program P] [--mag M] NAME[:CHECKSUM[:SCALE[:DESIGN]]]...";

/// One font reference as a DVI `fnt_def` would carry it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSpec {
    pub name: String,
    pub checksum: u32,
    pub scale: u32,
    pub design: u32,
}

impl FontSpec {
    pub fn parse(text: &str) -> CliResult<Self> {
        let invalid = || CliError::InvalidFontSpec(text.to_string());
        let mut parts = text.split(':');
        let name = parts.next().filter(|n| !n.is_empty()).ok_or_else(invalid)?;

        let checksum = match parts.next() {
            Some(v) => u32::from_str_radix(v, 8).map_err(|_| invalid())?,
            None => 0,
        };
        let scale = match parts.next() {
            Some(v) => v.parse().map_err(|_| invalid())?,
            None => DEFAULT_SIZE,
        };
        let design = match parts.next() {
            Some(v) => v.parse().map_err(|_| invalid())?,
            None => DEFAULT_SIZE,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self { name: name.to_string(), checksum, scale, design })
    }
}

#[derive(Debug, Clone)]
pub struct CliOptions {
    pub config: PoolConfig,
    pub fonts: Vec<FontSpec>,
    pub help: bool,
}

impl CliOptions {
    /// Parse everything after the program name
    pub fn parse<I, S>(args: I) -> CliResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = PoolConfig::default();
        let mut fonts = Vec::new();
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => {
                    return Ok(Self { config, fonts, help: true });
                }
                "--no-mktex" => config = config.with_generation(false),
                "--mode" => config = config.with_mode(number(&arg, args.next())? as usize),
                "--mag" => config = config.with_magnification(number(&arg, args.next())?),
                "--program" => {
                    let program = args.next().ok_or_else(|| CliError::MissingValue(arg.clone()))?;
                    config = config.with_program(&program);
                }
                option if option.starts_with("--") => return Err(CliError::UnknownOption(option.to_string())),
                _ => fonts.push(FontSpec::parse(&arg)?),
            }
        }

        if fonts.is_empty() {
            return Err(CliError::NoFonts);
        }
        Ok(Self { config, fonts, help: false })
    }
}

fn number(option: &str, value: Option<String>) -> CliResult<u32> {
    let value = value.ok_or_else(|| CliError::MissingValue(option.to_string()))?;
    value
        .parse()
        .map_err(|_| CliError::InvalidNumber { option: option.to_string(), value })
}
