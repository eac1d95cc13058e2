//! Font Pool Core - non-blocking DVI font resolution
//!
//! This crate keeps track of the fonts used by DVI documents, locates their
//! files through kpsewhich and has missing bitmaps generated by MetaFont,
//! independent of any specific user interface.

pub mod config;
pub mod constants;
pub mod dummy_backend;
pub mod error;
pub mod font;
pub mod mode;
pub mod pool;
#[cfg(feature = "pty")]
pub mod pty;
pub mod resolver;
pub mod traits;

// Re-export main types
pub use config::PoolConfig;
pub use error::{FontPoolError, FontPoolResult};
pub use font::{FontEntity, FontId, FontKey, FontKind, FontProblem, LoadedFont, ResolutionState};
pub use mode::{ResolutionMode, DEFAULT_MODE, MODES, NUMBER_OF_MODES};
pub use pool::{FontPool, LoadStatus};
#[cfg(feature = "pty")]
pub use pty::PtyLauncher;
pub use resolver::{ExitStatus, Invocation, PendingPass, ProcessEvent, ResolverMessage, ResolverProcess};

// Re-export traits and types
pub use traits::*;
