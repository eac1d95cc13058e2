//! Font entities tracked by the pool
//!
//! A [`FontEntity`] is one font requested by a document: its identity, where
//! it was found, and the loaded data once resolution has completed.

pub mod loader;
pub mod preamble;

pub use loader::{FileLoader, FontLoader, LoadRequest, LoadedFont};
pub use preamble::{parse_preamble, FontDefinition, FontFormat, Preamble, PreambleError};

use std::fmt;
use std::path::PathBuf;

use crate::constants::FIX_WORD_UNIT;

/// Stable handle of an entity inside one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(pub(crate) u64);

impl fmt::Display for FontId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity tuple used for de-duplication
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontKey {
    pub name: String,
    pub checksum: u32,
    pub scale: u32,
    pub design: u32,
}

/// Resolution progress of a font
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Unresolved,
    /// Part of a running locate-only batch
    PendingLocate,
    /// Part of a running batch that may invoke MetaFont
    PendingGenerate,
    Resolved,
    Failed,
}

impl ResolutionState {
    pub fn is_pending(self) -> bool {
        matches!(self, ResolutionState::PendingLocate | ResolutionState::PendingGenerate)
    }

    pub fn label(self) -> &'static str {
        match self {
            ResolutionState::Unresolved => "unresolved",
            ResolutionState::PendingLocate => "locating",
            ResolutionState::PendingGenerate => "generating",
            ResolutionState::Resolved => "resolved",
            ResolutionState::Failed => "failed",
        }
    }
}

/// What the located file turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontKind {
    Unknown,
    Virtual,
    Bitmap,
}

/// Non-fatal problem recorded on an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontProblem {
    /// The file was used anyway
    ChecksumMismatch { expected: u32, found: u32 },
    Unresolved,
    LoadFailed(String),
}

impl fmt::Display for FontProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontProblem::ChecksumMismatch { expected, found } => {
                write!(f, "checksum mismatch ({:o} != {:o})", expected, found)
            }
            FontProblem::Unresolved => write!(f, "not found"),
            FontProblem::LoadFailed(message) => write!(f, "load failed: {}", message),
        }
    }
}

/// One font requested by a document
#[derive(Debug)]
pub struct FontEntity {
    pub(crate) id: FontId,
    pub(crate) key: FontKey,
    pub(crate) parent: Option<FontId>,
    pub(crate) state: ResolutionState,
    pub(crate) kind: FontKind,
    pub(crate) in_use: bool,
    pub(crate) dpi: u32,
    pub(crate) filename: Option<PathBuf>,
    pub(crate) loaded: Option<LoadedFont>,
    pub(crate) problem: Option<FontProblem>,
    pub(crate) virtual_probed: bool,
    pub(crate) bitmap_probed: bool,
}

impl FontEntity {
    pub(crate) fn new(id: FontId, key: FontKey, parent: Option<FontId>, dpi: u32) -> Self {
        Self {
            id,
            key,
            parent,
            state: ResolutionState::Unresolved,
            kind: FontKind::Unknown,
            in_use: true,
            dpi,
            filename: None,
            loaded: None,
            problem: None,
            virtual_probed: false,
            bitmap_probed: false,
        }
    }

    pub fn id(&self) -> FontId {
        self.id
    }

    pub fn key(&self) -> &FontKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn checksum(&self) -> u32 {
        self.key.checksum
    }

    pub fn scale(&self) -> u32 {
        self.key.scale
    }

    pub fn design(&self) -> u32 {
        self.key.design
    }

    /// The virtual font that introduced this one, if any
    pub fn parent(&self) -> Option<FontId> {
        self.parent
    }

    pub fn state(&self) -> ResolutionState {
        self.state
    }

    pub fn kind(&self) -> FontKind {
        self.kind
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use
    }

    /// Resolution of the bitmap file this font is looked up at
    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    pub fn filename(&self) -> Option<&PathBuf> {
        self.filename.as_ref()
    }

    /// Loaded font data; only ever present while `Resolved`
    pub fn loaded(&self) -> Option<&LoadedFont> {
        self.loaded.as_ref()
    }

    pub fn problem(&self) -> Option<&FontProblem> {
        self.problem.as_ref()
    }

    pub fn checksum_mismatch(&self) -> bool {
        matches!(self.problem, Some(FontProblem::ChecksumMismatch { .. }))
    }

    /// File name of the virtual font variant, e.g. `cmr10.vf`
    pub fn vf_file_name(&self) -> String {
        format!("{}.vf", self.key.name)
    }

    /// File name of the bitmap variant, e.g. `cmr10.600pk`
    pub fn pk_file_name(&self) -> String {
        format!("{}.{}pk", self.key.name, self.dpi)
    }

    pub(crate) fn release_loaded(&mut self) {
        self.loaded = None;
    }
}

/// Resolution of a bitmap font for the given scaling at `mode_dpi`
///
/// `scale` and `design` are the DVI scaled size and design size;
/// `magnification` is in thousandths.
pub fn scaled_dpi(scale: u32, design: u32, magnification: u32, mode_dpi: u32) -> u32 {
    if design == 0 || scale == 0 {
        return mode_dpi;
    }
    let enlargement = (magnification as f64 * scale as f64) / (1000.0 * design as f64);
    (enlargement * mode_dpi as f64).round().max(1.0) as u32
}

/// Multiply a virtual font's scaled size with a fix-word from one of its
/// font definitions
pub fn scale_fix_word(scale: u32, fix_word: u32) -> u32 {
    ((scale as f64 * fix_word as f64) / FIX_WORD_UNIT).round() as u32
}
