//! # kpse-output
//!
//! Incremental parsing of the text a kpsewhich run writes while it locates
//! or generates font files. Output arrives in arbitrary chunks; the
//! [`LineBuffer`] reassembles complete lines and [`OutputLine`] tells the
//! caller what each one means.

pub mod line;
pub mod line_buffer;

pub use line::{OutputLine, basename};
pub use line_buffer::{LineBuffer, LineStats, MAX_LINE_LEN};
