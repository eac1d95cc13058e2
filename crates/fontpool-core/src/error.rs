// src/error.rs
use thiserror::Error;

/// Error hierarchy for the font pool
///
/// None of these is fatal to the hosting application: resolution failures
/// end up recorded on the font entity and the renderer draws placeholders.
#[derive(Error, Debug)]
pub enum FontPoolError {
    // Font outcome errors
    #[error("Checksum mismatch for font {font}: document says {expected:#o}, file says {found:#o}")]
    ChecksumMismatch { font: String, expected: u32, found: u32 },

    #[error("Font {font} could neither be located nor generated")]
    FontUnresolved { font: String },

    #[error("Invalid font file {path}: {message}")]
    InvalidFontData { path: String, message: String },

    // Process management errors
    #[error("PTY creation failed: {message}")]
    PtyCreationFailed { message: String },

    #[error("Failed to spawn font resolver: {program}: {message}")]
    ProcessSpawnFailed { program: String, message: String },

    #[error("Font resolver exited abnormally (exit code {code})")]
    ProcessAbnormalExit { code: u32 },

    #[error("No process launcher configured")]
    NoLauncher,

    // Configuration errors
    #[error("Invalid resolution mode index {index}, {count} modes available")]
    InvalidModeIndex { index: usize, count: usize },

    // Communication errors
    #[error("Resolver event channel closed")]
    ChannelClosed,

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

pub type FontPoolResult<T> = Result<T, FontPoolError>;
