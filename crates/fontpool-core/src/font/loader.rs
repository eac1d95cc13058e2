//! Loading located font files
//!
//! Turning a font file into drawable glyphs belongs to the renderer. The pool
//! only needs an opaque "load" step that also reports the checksum and, for
//! virtual fonts, the fonts they depend on.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{FontPoolError, FontPoolResult};
use crate::font::preamble::{parse_preamble, FontDefinition, FontFormat};

/// What the pool knows about a font when it asks for it to be loaded
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    pub name: &'a str,
    pub path: &'a Path,
    pub checksum: u32,
    pub scale: u32,
    pub design: u32,
}

/// A loaded font file. The pool keeps it alive while the font is resolved and
/// drops it on release or reset; the bytes are never interpreted by the pool.
#[derive(Clone)]
pub struct LoadedFont {
    pub format: FontFormat,
    pub checksum: u32,
    pub design_size: u32,
    /// Fonts a virtual font refers to; always empty for bitmap fonts
    pub definitions: Vec<FontDefinition>,
    data: Arc<[u8]>,
}

impl fmt::Debug for LoadedFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedFont")
            .field("format", &self.format)
            .field("checksum", &self.checksum)
            .field("design_size", &self.design_size)
            .field("definitions", &self.definitions.len())
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl LoadedFont {
    pub fn new(format: FontFormat, checksum: u32, design_size: u32, definitions: Vec<FontDefinition>, data: Vec<u8>) -> Self {
        Self { format, checksum, design_size, definitions, data: data.into() }
    }

    pub fn bitmap(checksum: u32) -> Self {
        Self::new(FontFormat::Pk, checksum, 0, Vec::new(), Vec::new())
    }

    pub fn virtual_font(checksum: u32, definitions: Vec<FontDefinition>) -> Self {
        Self::new(FontFormat::Virtual, checksum, 0, definitions, Vec::new())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_virtual(&self) -> bool {
        self.format == FontFormat::Virtual
    }
}

/// The opaque load operation provided by the glyph decoder
pub trait FontLoader {
    fn load(&mut self, request: &LoadRequest<'_>) -> FontPoolResult<LoadedFont>;
}

/// Reads PK and VF files from disk
#[derive(Debug, Default, Clone, Copy)]
pub struct FileLoader;

impl FontLoader for FileLoader {
    fn load(&mut self, request: &LoadRequest<'_>) -> FontPoolResult<LoadedFont> {
        let data = std::fs::read(request.path)?;
        let preamble = parse_preamble(&data).map_err(|e| FontPoolError::InvalidFontData {
            path: request.path.display().to_string(),
            message: e.to_string(),
        })?;
        debug!(
            "Loaded {} from {} ({} bytes, {:?})",
            request.name,
            request.path.display(),
            data.len(),
            preamble.format
        );
        Ok(LoadedFont::new(
            preamble.format,
            preamble.checksum,
            preamble.design_size,
            preamble.definitions,
            data,
        ))
    }
}
