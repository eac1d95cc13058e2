//! Minimal reader for PK and VF file preambles
//!
//! Only what the pool needs is decoded: the checksum to compare against the
//! document, the design size, and for virtual fonts the fonts they refer to.
//! Glyph data is left to the decoder that consumes [`LoadedFont`](super::LoadedFont).

const PRE: u8 = 247;
const PK_ID: u8 = 89;
const VF_ID: u8 = 202;
const FNT_DEF1: u8 = 243;
const FNT_DEF4: u8 = 246;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFormat {
    /// Packed bitmap font
    Pk,
    Virtual,
}

/// A font referenced from a virtual font
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontDefinition {
    /// Local font number inside the virtual font
    pub number: u32,
    pub checksum: u32,
    /// Scaled size as a fix-word relative to the virtual font's size
    pub scale: u32,
    pub design: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preamble {
    pub format: FontFormat,
    pub comment: String,
    pub checksum: u32,
    pub design_size: u32,
    pub definitions: Vec<FontDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreambleError {
    #[error("file ends inside the preamble")]
    Truncated,

    #[error("missing preamble command, found byte {0}")]
    MissingPreamble(u8),

    #[error("unknown font file identification byte {0}")]
    UnknownId(u8),
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn bytes(&mut self, n: usize) -> Result<&'a [u8], PreambleError> {
        let end = self.pos.checked_add(n).ok_or(PreambleError::Truncated)?;
        let slice = self.data.get(self.pos..end).ok_or(PreambleError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, PreambleError> {
        Ok(self.bytes(1)?[0])
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Big-endian unsigned integer of `n` bytes
    fn uint(&mut self, n: usize) -> Result<u32, PreambleError> {
        Ok(self.bytes(n)?.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
    }
}

pub fn parse_preamble(data: &[u8]) -> Result<Preamble, PreambleError> {
    let mut cur = Cursor { data, pos: 0 };

    let pre = cur.byte()?;
    if pre != PRE {
        return Err(PreambleError::MissingPreamble(pre));
    }
    let id = cur.byte()?;
    let comment_len = cur.byte()? as usize;
    let comment = String::from_utf8_lossy(cur.bytes(comment_len)?).into_owned();

    match id {
        PK_ID => {
            let design_size = cur.uint(4)?;
            let checksum = cur.uint(4)?;
            Ok(Preamble { format: FontFormat::Pk, comment, checksum, design_size, definitions: Vec::new() })
        }
        VF_ID => {
            let checksum = cur.uint(4)?;
            let design_size = cur.uint(4)?;
            let mut definitions = Vec::new();
            while let Some(op @ FNT_DEF1..=FNT_DEF4) = cur.peek() {
                cur.pos += 1;
                definitions.push(read_font_definition(&mut cur, (op - FNT_DEF1 + 1) as usize)?);
            }
            Ok(Preamble { format: FontFormat::Virtual, comment, checksum, design_size, definitions })
        }
        other => Err(PreambleError::UnknownId(other)),
    }
}

fn read_font_definition(cur: &mut Cursor<'_>, number_len: usize) -> Result<FontDefinition, PreambleError> {
    let number = cur.uint(number_len)?;
    let checksum = cur.uint(4)?;
    let scale = cur.uint(4)?;
    let design = cur.uint(4)?;
    let area_len = cur.byte()? as usize;
    let name_len = cur.byte()? as usize;
    let full = cur.bytes(area_len + name_len)?;
    // The area is a directory hint from the TeX era; lookup goes by name only
    let name = String::from_utf8_lossy(&full[area_len..]).into_owned();
    Ok(FontDefinition { number, checksum, scale, design, name })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn pk_bytes(checksum: u32, design: u32) -> Vec<u8> {
        let mut data = vec![PRE, PK_ID, 3];
        data.extend_from_slice(b"mf!");
        data.extend_from_slice(&design.to_be_bytes());
        data.extend_from_slice(&checksum.to_be_bytes());
        data.extend_from_slice(&[0; 8]);
        data.push(248);
        data
    }

    pub(crate) fn vf_bytes(checksum: u32, defs: &[(&str, u32, u32, u32)]) -> Vec<u8> {
        let mut data = vec![PRE, VF_ID, 0];
        data.extend_from_slice(&checksum.to_be_bytes());
        data.extend_from_slice(&(10u32 << 20).to_be_bytes());
        for (i, (name, cs, scale, design)) in defs.iter().enumerate() {
            data.push(FNT_DEF1);
            data.push(i as u8);
            data.extend_from_slice(&cs.to_be_bytes());
            data.extend_from_slice(&scale.to_be_bytes());
            data.extend_from_slice(&design.to_be_bytes());
            data.push(0);
            data.push(name.len() as u8);
            data.extend_from_slice(name.as_bytes());
        }
        data.push(248);
        data
    }

    #[test]
    fn test_pk_preamble() {
        let pre = parse_preamble(&pk_bytes(0o1234, 10 << 20)).unwrap();
        assert_eq!(pre.format, FontFormat::Pk);
        assert_eq!(pre.checksum, 0o1234);
        assert_eq!(pre.design_size, 10 << 20);
        assert_eq!(pre.comment, "mf!");
        assert!(pre.definitions.is_empty());
    }

    #[test]
    fn test_vf_preamble_with_definitions() {
        let data = vf_bytes(77, &[("rptmr", 11, 1 << 20, 10 << 20), ("rpsyr", 12, 1 << 19, 10 << 20)]);
        let pre = parse_preamble(&data).unwrap();
        assert_eq!(pre.format, FontFormat::Virtual);
        assert_eq!(pre.checksum, 77);
        assert_eq!(pre.definitions.len(), 2);
        assert_eq!(pre.definitions[0].name, "rptmr");
        assert_eq!(pre.definitions[1].number, 1);
        assert_eq!(pre.definitions[1].scale, 1 << 19);
    }

    #[test]
    fn test_area_is_dropped_from_name() {
        let mut data = vec![PRE, VF_ID, 0];
        data.extend_from_slice(&[0; 8]);
        data.extend_from_slice(&[FNT_DEF1, 0]);
        data.extend_from_slice(&[0; 12]);
        data.extend_from_slice(&[4, 5]);
        data.extend_from_slice(b"/tmpcmr10");
        let pre = parse_preamble(&data).unwrap();
        assert_eq!(pre.definitions[0].name, "cmr10");
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_preamble(&[]), Err(PreambleError::Truncated));
        assert_eq!(parse_preamble(&[0, 89]), Err(PreambleError::MissingPreamble(0)));
        assert_eq!(parse_preamble(&[PRE, 3, 0]), Err(PreambleError::UnknownId(3)));
        assert_eq!(parse_preamble(&pk_bytes(1, 2)[..9]), Err(PreambleError::Truncated));
    }
}
