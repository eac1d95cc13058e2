//! Resolution modes for bitmap fonts
//!
//! Each mode pairs a MetaFont device mode with the resolution its bitmaps are
//! rendered at. kpsewhich uses both to find, or create, `name.<dpi>pk` files.

/// One MetaFont mode / resolution pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionMode {
    /// Mode name as understood by MetaFont and mktexpk
    pub name: &'static str,
    /// Human-readable printer name
    pub label: &'static str,
    pub dpi: u32,
}

pub const NUMBER_OF_MODES: usize = 3;

/// Mode used when an out-of-range index is requested
pub const DEFAULT_MODE: usize = 1;

pub const MODES: [ResolutionMode; NUMBER_OF_MODES] = [
    ResolutionMode { name: "cx", label: "Canon CX", dpi: 300 },
    ResolutionMode { name: "ljfour", label: "LaserJet 4", dpi: 600 },
    ResolutionMode { name: "lexmarks", label: "Lexmark S", dpi: 1200 },
];

/// Map any index onto a valid one
pub fn clamp_mode(index: usize) -> usize {
    if index < NUMBER_OF_MODES {
        index
    } else {
        DEFAULT_MODE
    }
}

pub fn mode(index: usize) -> &'static ResolutionMode {
    &MODES[clamp_mode(index)]
}
