//! dvifonts - locate and generate the fonts of DVI documents
//!
//! This crate bundles the font pool with a console progress display and
//! the command line used by the `dvifonts` binary:
//! - Two-pass resolution of virtual and bitmap fonts through kpsewhich
//! - Bitmap generation with mktexpk while the caller keeps running
//! - Cross-document font cache

pub mod cli;
pub mod console;
pub mod error;

// Re-export main types for convenience
pub use cli::{CliOptions, FontSpec};
pub use console::ConsoleObserver;
pub use error::{CliError, CliResult};
pub use fontpool_core::*;
