//! Report rendering: review text → paginated PDF via `printpdf`.
//!
//! Layout is deliberately simple: one Unicode TrueType font at a fixed size,
//! paragraphs word-wrapped to the usable width, a fixed line height, and a new
//! page whenever the next line would cross the bottom margin. Line widths are
//! summed from the font's own glyph advances, so a line never runs past the
//! right margin whatever the mix of wide and narrow characters.
//!
//! printpdf's ToUnicode map for external fonts writes non-BMP code points as
//! odd-length hex, which text extractors reject. After saving, the map is
//! replaced with one built from the glyphs the report actually uses.
//!
//! Failures are fatal and leave no partial artifact: the PDF is built in
//! memory, written to a sibling temp file, then renamed over the target.

use crate::config::ReportConfig;
use crate::error::ReviewError;
use crate::pipeline::font::ReportFont;
use crate::pipeline::postprocess::normalise_report_text;
use printpdf::{Mm, PdfDocument};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PT_TO_MM: f32 = 25.4 / 72.0;

/// Render `text` to the configured report path, overwriting any prior file.
///
/// The text is drawn as given; only line endings and invisible characters
/// are normalised, and runs of spaces collapse where lines are wrapped.
///
/// # Errors
/// `MissingConfiguration` for unset paths, `FontNotFound` / `FontLoadFailed`
/// for font problems, `ReportRenderFailed` / `OutputWriteFailed` otherwise.
pub fn render_report(text: &str, config: &ReportConfig) -> Result<PathBuf, ReviewError> {
    config.validate()?;
    let (font_path, output_path) = config.paths()?;

    let font_bytes = std::fs::read(font_path).map_err(|_| ReviewError::FontNotFound {
        path: font_path.to_path_buf(),
    })?;
    let font = ReportFont::parse(&font_bytes).map_err(|e| ReviewError::FontLoadFailed {
        path: font_path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let size = config.font_size_pt;
    let lines = layout_lines(&normalise_report_text(text), config.usable_width_mm(), |s| {
        font.text_width_mm(s, size)
    });
    let pages: Vec<&[String]> = lines.chunks(lines_per_page(config)).collect();
    debug!("Report layout: {} lines on {} pages", lines.len(), pages.len().max(1));

    let pdf = build_pdf(&pages, &font_bytes, font_path, config)?;
    let cmap = font.to_unicode_cmap(lines.iter().map(String::as_str));
    let bytes = replace_to_unicode(&pdf, cmap.as_bytes())?;
    write_atomic(output_path, &bytes)?;

    info!(
        "Report written: {} ({} bytes)",
        output_path.display(),
        bytes.len()
    );
    Ok(output_path.to_path_buf())
}

/// [`render_report`] on the blocking pool.
pub async fn render_report_async(text: String, config: ReportConfig) -> Result<PathBuf, ReviewError> {
    tokio::task::spawn_blocking(move || render_report(&text, &config))
        .await
        .map_err(|e| ReviewError::Internal(format!("Report task panicked: {e}")))?
}

/// Lines that fit between the top and bottom margins.
pub fn lines_per_page(config: &ReportConfig) -> usize {
    let usable = config.page_height_mm - config.margin_mm - config.bottom_margin_mm;
    ((usable / config.line_height_mm).floor() as usize).max(1)
}

/// Split text into output lines no wider than `max_width`.
///
/// Each input line is a paragraph, word-wrapped using `measure` (any unit,
/// as long as it matches `max_width` and is additive over concatenation).
/// Words wider than a line are split between characters; a single character
/// wider than the line still gets a line of its own. Empty input lines stay
/// as blank lines.
pub fn layout_lines<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    text.split('\n')
        .flat_map(|paragraph| wrap_paragraph(paragraph, max_width, &measure))
        .collect()
}

fn wrap_paragraph<F>(paragraph: &str, max_width: f32, measure: &F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let space = measure(" ");
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0;

    for word in paragraph.split_whitespace() {
        for (piece, piece_width) in split_word(word, max_width, measure) {
            if !current.is_empty() && current_width + space + piece_width > max_width {
                lines.push(std::mem::take(&mut current));
                current_width = 0.0;
            }
            if !current.is_empty() {
                current.push(' ');
                current_width += space;
            }
            current.push_str(piece);
            current_width += piece_width;
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Cut `word` into pieces that each fit `max_width`, with their widths.
fn split_word<'a, F>(word: &'a str, max_width: f32, measure: &F) -> Vec<(&'a str, f32)>
where
    F: Fn(&str) -> f32,
{
    let width = measure(word);
    if width <= max_width {
        return vec![(word, width)];
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    let mut piece_width = 0.0;
    for (idx, ch) in word.char_indices() {
        let ch_width = measure(&word[idx..idx + ch.len_utf8()]);
        if idx > start && piece_width + ch_width > max_width {
            pieces.push((&word[start..idx], piece_width));
            start = idx;
            piece_width = 0.0;
        }
        piece_width += ch_width;
    }
    pieces.push((&word[start..], piece_width));
    pieces
}

fn build_pdf(
    pages: &[&[String]],
    font_bytes: &[u8],
    font_path: &Path,
    config: &ReportConfig,
) -> Result<Vec<u8>, ReviewError> {
    let width = Mm(config.page_width_mm);
    let height = Mm(config.page_height_mm);
    let (doc, first_page, first_layer) = PdfDocument::new(&config.title, width, height, "Layer 1");

    let font = doc
        .add_external_font(font_bytes)
        .map_err(|e| ReviewError::FontLoadFailed {
            path: font_path.to_path_buf(),
            detail: e.to_string(),
        })?;

    // Baseline sits a little above the bottom of each line box.
    let baseline_offset = config.line_height_mm * 0.5 + config.font_size_pt * PT_TO_MM * 0.35;

    for (i, lines) in pages.iter().enumerate() {
        let (page, layer) = if i == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(width, height, "Layer 1")
        };
        let layer = doc.get_page(page).get_layer(layer);

        let mut top = config.margin_mm;
        for line in lines.iter() {
            if !line.is_empty() {
                let y = config.page_height_mm - top - baseline_offset;
                layer.use_text(line.as_str(), config.font_size_pt, Mm(config.margin_mm), Mm(y), &font);
            }
            top += config.line_height_mm;
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ReviewError::ReportRenderFailed(format!("PDF save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| ReviewError::ReportRenderFailed(format!("PDF buffer error: {e}")))
}

/// Swap every font's ToUnicode stream in `pdf` for `cmap`.
fn replace_to_unicode(pdf: &[u8], cmap: &[u8]) -> Result<Vec<u8>, ReviewError> {
    let render_err = |e: lopdf::Error| ReviewError::ReportRenderFailed(format!("ToUnicode rewrite: {e}"));

    let mut doc = lopdf::Document::load_mem(pdf).map_err(render_err)?;
    let mut targets = Vec::new();
    for object in doc.objects.values() {
        collect_to_unicode_refs(object, &mut targets);
    }
    targets.sort_unstable();
    targets.dedup();

    for id in &targets {
        if let lopdf::Object::Stream(stream) = doc.get_object_mut(*id).map_err(render_err)? {
            stream.set_plain_content(cmap.to_vec());
        }
    }
    debug!("Replaced {} ToUnicode map(s)", targets.len());

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| render_err(lopdf::Error::from(e)))?;
    Ok(out)
}

fn collect_to_unicode_refs(object: &lopdf::Object, out: &mut Vec<lopdf::ObjectId>) {
    match object {
        lopdf::Object::Dictionary(dict) => {
            for (key, value) in dict.iter() {
                match value {
                    lopdf::Object::Reference(id) if key.as_slice() == b"ToUnicode" => out.push(*id),
                    _ => collect_to_unicode_refs(value, out),
                }
            }
        }
        lopdf::Object::Array(items) => {
            for item in items {
                collect_to_unicode_refs(item, out);
            }
        }
        _ => {}
    }
}

/// Write to a temp sibling, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ReviewError> {
    let write_err = |source: std::io::Error| ReviewError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    std::fs::write(&tmp_path, bytes).map_err(write_err)?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        write_err(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One unit per character.
    fn count(s: &str) -> f32 {
        s.chars().count() as f32
    }

    /// Capitals twice as wide as everything else.
    fn caps_wide(s: &str) -> f32 {
        s.chars().map(|c| if c.is_uppercase() { 2.0 } else { 1.0 }).sum()
    }

    #[test]
    fn default_lines_per_page() {
        // (297 − 10 − 15) / 10
        assert_eq!(lines_per_page(&ReportConfig::default()), 27);
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = layout_lines("alpha beta gamma delta", 11.0, count);
        assert_eq!(lines, vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn long_word_is_hard_split() {
        let lines = layout_lines("ab abcdefghij", 4.0, count);
        assert_eq!(lines, vec!["ab", "abcd", "efgh", "ij"]);
    }

    #[test]
    fn wide_glyphs_wrap_earlier() {
        // Same character count, but the capitals take twice the room.
        assert_eq!(layout_lines("abcd efgh", 9.0, caps_wide), vec!["abcd efgh"]);
        assert_eq!(layout_lines("ABCD EFGH", 9.0, caps_wide), vec!["ABCD", "EFGH"]);
    }

    #[test]
    fn uppercase_paragraph_stays_inside_width() {
        let text = "- SECTION OF CTD: MODULE 3 QUALITY 3.2.P.5.1 SPECIFICATIONS AND ANALYTICAL PROCEDURES ".repeat(12);
        let lines = layout_lines(&text, 60.0, caps_wide);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(caps_wide(line) <= 60.0, "{:?} is {} wide", line, caps_wide(line));
        }
    }

    #[test]
    fn hard_split_respects_wide_glyphs() {
        let lines = layout_lines("ABCDEFGH", 5.0, caps_wide);
        assert_eq!(lines, vec!["AB", "CD", "EF", "GH"]);
    }

    #[test]
    fn glyph_wider_than_line_gets_own_line() {
        assert_eq!(layout_lines("AA", 1.0, caps_wide), vec!["A", "A"]);
    }

    #[test]
    fn blank_lines_are_preserved() {
        let lines = layout_lines("F1\n\nF2", 80.0, count);
        assert_eq!(lines, vec!["F1", "", "F2"]);
    }

    #[test]
    fn empty_text_is_one_blank_line() {
        assert_eq!(layout_lines("", 80.0, count), vec![String::new()]);
    }

    #[test]
    fn layout_keeps_every_word() {
        let text = "Review Comments: the stability data in 3.2.P.8 lack a bracketing rationale. ".repeat(40);
        let lines = layout_lines(&text, 89.0, caps_wide);
        let rejoined: Vec<&str> = lines.iter().flat_map(|l| l.split_whitespace()).collect();
        let expected: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(rejoined, expected);
    }

    #[test]
    fn to_unicode_refs_are_found_in_nested_dictionaries() {
        use lopdf::{dictionary, Object};
        let font = dictionary! { "Subtype" => "Type0", "ToUnicode" => Object::Reference((7, 0)) };
        let resources = Object::Dictionary(dictionary! { "Font" => dictionary! { "F0" => font } });
        let mut found = Vec::new();
        collect_to_unicode_refs(&resources, &mut found);
        assert_eq!(found, vec![(7, 0)]);
    }

    #[test]
    fn missing_font_is_fatal_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report.pdf");
        let cfg = ReportConfig::new(dir.path().join("missing.ttf"), &out);
        let err = render_report("some review", &cfg).unwrap_err();
        assert!(matches!(err, ReviewError::FontNotFound { .. }), "got: {err}");
        assert!(!out.exists());
    }

    #[test]
    fn unparseable_font_is_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let font = dir.path().join("broken.ttf");
        std::fs::write(&font, b"not a font").unwrap();
        let out = dir.path().join("report.pdf");
        let err = render_report("some review", &ReportConfig::new(&font, &out)).unwrap_err();
        assert!(matches!(err, ReviewError::FontLoadFailed { .. }), "got: {err}");
        assert!(!out.exists());
    }

    #[test]
    fn unset_output_path_is_missing_configuration() {
        let cfg = ReportConfig {
            font_path: Some("font.ttf".into()),
            ..ReportConfig::default()
        };
        assert!(matches!(
            render_report("x", &cfg).unwrap_err(),
            ReviewError::MissingConfiguration { .. }
        ));
    }
}
