//! Report font: glyph metrics and the text-extraction map, read from the
//! same TrueType file that printpdf embeds.
//!
//! printpdf writes external-font text as 2-byte glyph ids under
//! `Identity-H`, so layout widths and the ToUnicode CMap both have to be
//! derived from those glyph ids. Characters without a glyph are dropped
//! by printpdf; they take no width here and get no CMap entry.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use ttf_parser::{Face, FaceParsingError};

const PT_TO_MM: f32 = 25.4 / 72.0;

/// Entries per `beginbfchar` section.
const BFCHAR_SECTION_LEN: usize = 100;

/// A parsed report font.
pub struct ReportFont<'a> {
    face: Face<'a>,
}

impl<'a> ReportFont<'a> {
    /// Parse the first face in a TTF/OTF file.
    pub fn parse(data: &'a [u8]) -> Result<Self, FaceParsingError> {
        Ok(Self {
            face: Face::parse(data, 0)?,
        })
    }

    /// Glyph id printpdf will write for `ch`, if the font covers it.
    pub fn glyph_id(&self, ch: char) -> Option<u16> {
        self.face.glyph_index(ch).map(|id| id.0)
    }

    /// Horizontal advance of `ch` in millimetres at `size_pt`.
    pub fn char_width_mm(&self, ch: char, size_pt: f32) -> f32 {
        let Some(gid) = self.face.glyph_index(ch) else {
            return 0.0;
        };
        let advance = self.face.glyph_hor_advance(gid).unwrap_or(0) as f32;
        advance / self.face.units_per_em() as f32 * size_pt * PT_TO_MM
    }

    /// Width of `text` in millimetres at `size_pt`. No kerning is applied,
    /// matching how printpdf positions glyphs.
    pub fn text_width_mm(&self, text: &str, size_pt: f32) -> f32 {
        text.chars().map(|ch| self.char_width_mm(ch, size_pt)).sum()
    }

    /// Build a ToUnicode CMap covering every glyph used by `lines`.
    ///
    /// Targets are UTF-16BE, so characters outside the BMP become surrogate
    /// pairs and every hex string has an even number of digits.
    pub fn to_unicode_cmap<'t>(&self, lines: impl IntoIterator<Item = &'t str>) -> String {
        let mut used: BTreeMap<u16, char> = BTreeMap::new();
        for ch in lines.into_iter().flat_map(str::chars) {
            if let Some(gid) = self.glyph_id(ch) {
                used.entry(gid).or_insert(ch);
            }
        }
        let entries: Vec<(u16, char)> = used.into_iter().collect();

        let mut cmap = String::from(
            "/CIDInit /ProcSet findresource begin\n\
             12 dict begin\n\
             begincmap\n\
             /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
             /CMapName /Adobe-Identity-UCS def\n\
             /CMapType 2 def\n\
             1 begincodespacerange\n\
             <0000> <FFFF>\n\
             endcodespacerange\n",
        );
        for section in entries.chunks(BFCHAR_SECTION_LEN) {
            let _ = writeln!(cmap, "{} beginbfchar", section.len());
            for &(gid, ch) in section {
                let _ = writeln!(cmap, "<{gid:04X}> <{}>", utf16_hex(ch));
            }
            cmap.push_str("endbfchar\n");
        }
        cmap.push_str(
            "endcmap\n\
             CMapName currentdict /CMap defineresource pop\n\
             end\n\
             end\n",
        );
        cmap
    }
}

fn utf16_hex(ch: char) -> String {
    let mut units = [0u16; 2];
    ch.encode_utf16(&mut units)
        .iter()
        .map(|u| format!("{u:04X}"))
        .collect()
}
