//! Result types produced by a review run.

use crate::error::{ChunkError, DocumentError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of reading one CTD module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    /// 1-based module number.
    pub module: usize,
    /// Path or URL the module was read from.
    pub source: String,
    /// Extracted text; `None` when the module was dropped.
    pub text: Option<String>,
    /// Character count of `text` (0 when dropped).
    pub chars: usize,
    pub error: Option<DocumentError>,
}

impl DocumentResult {
    pub fn is_usable(&self) -> bool {
        self.error.is_none() && self.text.is_some()
    }

    /// First `max_chars` characters of the extracted text, for previews.
    pub fn preview(&self, max_chars: usize) -> Option<&str> {
        let text = self.text.as_deref()?;
        let end = text
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        Some(&text[..end])
    }
}

/// Outcome of reviewing one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentResult {
    /// 1-based chunk index.
    pub chunk: usize,
    /// Trimmed review text; empty when the chunk failed.
    pub text: String,
    /// Generation attempts made (1 on first-try success).
    pub attempts: u32,
    pub duration_ms: u64,
    pub error: Option<ChunkError>,
}

impl FragmentResult {
    /// The fragment, if the chunk succeeded with non-empty text.
    pub fn fragment(&self) -> Option<&str> {
        match self.error {
            None if !self.text.is_empty() => Some(&self.text),
            _ => None,
        }
    }
}

/// Review text plus the per-chunk outcomes that produced it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewText {
    /// Non-empty fragments joined by blank lines, in chunk order.
    pub text: String,
    pub fragments: Vec<FragmentResult>,
}

impl ReviewText {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn failed_chunks(&self) -> usize {
        self.fragments.iter().filter(|f| f.error.is_some()).count()
    }
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewStats {
    pub total_documents: usize,
    pub usable_documents: usize,
    pub combined_chars: usize,
    pub total_chunks: usize,
    pub reviewed_chunks: usize,
    pub failed_chunks: usize,
    pub total_attempts: u64,
    pub extract_duration_ms: u64,
    pub review_duration_ms: u64,
    pub report_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutput {
    /// The full review (fragments joined by blank lines).
    pub review: String,
    /// Where the PDF report was written.
    pub report_path: PathBuf,
    pub documents: Vec<DocumentResult>,
    pub fragments: Vec<FragmentResult>,
    pub stats: ReviewStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: Option<&str>) -> DocumentResult {
        DocumentResult {
            module: 1,
            source: "m1.pdf".into(),
            chars: text.map(|t| t.chars().count()).unwrap_or(0),
            text: text.map(String::from),
            error: None,
        }
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let d = doc(Some("déjà vu"));
        assert_eq!(d.preview(4), Some("déjà"));
        assert_eq!(d.preview(100), Some("déjà vu"));
        assert_eq!(doc(None).preview(4), None);
    }

    #[test]
    fn failed_fragment_has_no_text() {
        let f = FragmentResult {
            chunk: 1,
            text: String::new(),
            attempts: 3,
            duration_ms: 0,
            error: Some(ChunkError::RetriesExhausted {
                chunk: 1,
                attempts: 3,
                detail: "x".into(),
            }),
        };
        assert_eq!(f.fragment(), None);
    }

    #[test]
    fn empty_success_is_not_a_fragment() {
        let f = FragmentResult {
            chunk: 1,
            text: String::new(),
            attempts: 1,
            duration_ms: 0,
            error: None,
        };
        assert_eq!(f.fragment(), None);
    }
}
