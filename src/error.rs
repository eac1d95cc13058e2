// src/error.rs
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CliError {
    #[error("Missing value for {0}")]
    MissingValue(String),

    #[error("Invalid number for {option}: {value}")]
    InvalidNumber { option: String, value: String },

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Invalid font specification '{0}', expected NAME[:CHECKSUM[:SCALE[:DESIGN]]]")]
    InvalidFontSpec(String),

    #[error("No fonts given")]
    NoFonts,
}

pub type CliResult<T> = Result<T, CliError>;
