//! Post-processing: normalisation of review text before rendering.
//!
//! The report reproduces the review as written, Markdown markers and all.
//! These rules only touch what a PDF page cannot show faithfully: carriage
//! returns, zero-width characters a TrueType font renders as boxes, and
//! trailing whitespace that would otherwise count toward line width.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so every later rule can assume `\n`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all normalisation rules to review text bound for the PDF report.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Trim trailing spaces and tabs per line
pub fn normalise_report_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    trim_trailing_whitespace(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Invisible characters ─────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
            )
        })
        .collect()
}

// ── Rule 3: Trailing whitespace ──────────────────────────────────────────────

static RE_TRAILING_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)[ \t]+$").unwrap());

fn trim_trailing_whitespace(input: &str) -> String {
    RE_TRAILING_WS.replace_all(input, "").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible_chars() {
        assert_eq!(remove_invisible_chars("\u{FEFF}GMP\u{200B} site"), "GMP site");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(trim_trailing_whitespace("a  \nb\t\n  c"), "a\nb\n  c");
    }

    #[test]
    fn test_markdown_is_kept() {
        let input = "## 3.2.S Drug Substance\n\n- **Section of CTD:** Module 3\n- __Review Comments:__ add data\n```\nBatch #4\n```";
        assert_eq!(normalise_report_text(input), input);
    }

    #[test]
    fn test_blank_line_runs_are_kept() {
        assert_eq!(normalise_report_text("F1\n\n\n\nF2\n"), "F1\n\n\n\nF2\n");
    }

    #[test]
    fn test_normalise_full_pipeline() {
        let input = "## Review\r\n\r\n- **Section of CTD:** Module\u{200B} 1   \r\n- Review Comments: ok\r\n";
        assert_eq!(
            normalise_report_text(input),
            "## Review\n\n- **Section of CTD:** Module 1\n- Review Comments: ok\n"
        );
    }
}
