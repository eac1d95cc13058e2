use std::path::PathBuf;

const GENERATION_MARKER: &str = "kpathsea: Running";
const UNRESOLVED_MARKER: &str = "don't know how to create bitmap font for ";

/// Meaning of one complete line of resolver output.
///
/// kpsewhich prints the path of every file it finds on a line of its own.
/// When bitmap generation is allowed it also runs mktexpk and MetaFont, whose
/// chatter shares the same stream, so anything that is not recognised as a
/// result is passed on as diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    /// A font file was found (or has just been generated) at this path
    Found(PathBuf),
    /// mktexpk was started for `font`; `dpi` is the requested resolution
    GenerationStarted { font: String, dpi: Option<u32> },
    /// The generator gave up on `font`
    Unresolved { font: String },
    /// Anything else, typically MetaFont progress output
    Diagnostic(String),
    Blank,
}

impl OutputLine {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return OutputLine::Blank;
        }

        if let Some(start) = trimmed.find(GENERATION_MARKER) {
            // "kpathsea: Running mktexpk --mfmode ljfour ... --dpi 600 cmr10":
            // the last word is the font, the one before it the resolution.
            let mut words = trimmed[start..].split_whitespace().rev();
            if let Some(font) = words.next() {
                let dpi = words.next().and_then(|w| w.parse().ok());
                return OutputLine::GenerationStarted { font: font.to_string(), dpi };
            }
        }

        if let Some(start) = trimmed.find(UNRESOLVED_MARKER) {
            let font = trimmed[start + UNRESOLVED_MARKER.len()..]
                .trim()
                .trim_end_matches('.');
            if !font.is_empty() {
                return OutputLine::Unresolved { font: font.to_string() };
            }
        }

        if is_absolute_path(trimmed) {
            return OutputLine::Found(PathBuf::from(trimmed));
        }

        OutputLine::Diagnostic(line.to_string())
    }

    /// Whether the line reports the outcome for a font rather than progress
    pub fn is_result(&self) -> bool {
        matches!(self, OutputLine::Found(_) | OutputLine::Unresolved { .. })
    }
}

fn is_absolute_path(s: &str) -> bool {
    if s.ends_with(':') || s.contains("  ") {
        return false;
    }
    let bytes = s.as_bytes();
    match bytes {
        [b'/', next, ..] => *next != b'/' && *next != b'*',
        [drive, b':', b'\\' | b'/', ..] => drive.is_ascii_alphabetic(),
        _ => false,
    }
}

/// File name component of a path printed by the resolver, whatever its
/// separator convention.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
