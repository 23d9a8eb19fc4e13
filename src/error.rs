//! Error types for the ctd-review library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`ReviewError`] — **Fatal**: the run cannot produce a report at all
//!   (missing configuration, nothing extractable, nothing reviewed, font or
//!   filesystem failure while rendering). Returned as `Err(ReviewError)`.
//!
//! * [`DocumentError`] — **Non-fatal**: one CTD module could not be read or
//!   yielded no text. Stored in [`crate::output::DocumentResult`]; the module
//!   is dropped from the combined text and the run continues.
//!
//! * [`ChunkError`] — **Non-fatal**: one chunk exhausted its retries. Stored in
//!   [`crate::output::FragmentResult`]; its review fragment is simply absent.
//!
//! [`GenerationError`] is the raw failure of one generation attempt; the
//! review client retries on it and never lets it escape.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ctd-review library.
#[derive(Debug, Error)]
pub enum ReviewError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The input was read, but is not a PDF.
    #[error("'{source_label}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { source_label: String, magic: Vec<u8> },

    // ── Config errors ─────────────────────────────────────────────────────
    /// A required setting (API key, font path, output path) is unset.
    #[error("Missing configuration: {key} is not set.\n{hint}")]
    MissingConfiguration { key: String, hint: String },

    /// The configured provider could not be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Run errors ────────────────────────────────────────────────────────
    /// Every module failed extraction; there is nothing to review.
    #[error("None of the {total} documents produced usable text.\nFirst error: {first_error}")]
    NoUsableDocuments { total: usize, first_error: String },

    /// Every chunk failed (or returned nothing); the review is empty.
    #[error("Failed to generate a review: all {chunks} chunks failed after {retries} attempts each.")]
    EmptyReview { chunks: usize, retries: u32 },

    // ── Report errors ─────────────────────────────────────────────────────
    /// The configured font file does not exist.
    #[error("Report font not found: '{path}'\nPoint --font (CTD_REVIEW_FONT) at a Unicode TrueType font.")]
    FontNotFound { path: PathBuf },

    /// The font file exists but could not be loaded.
    #[error("Failed to load report font '{path}': {detail}")]
    FontLoadFailed { path: PathBuf, detail: String },

    /// printpdf failed to lay out or serialise the document.
    #[error("Failed to render report: {0}")]
    ReportRenderFailed(String),

    /// Could not create or write the report file.
    #[error("Failed to write report '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single CTD module.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// The input could not be resolved to PDF bytes.
    #[error("Module {module}: {detail}")]
    InputFailed { module: usize, detail: String },

    /// The PDF parser rejected the file (corrupt, encrypted, unsupported).
    #[error("Module {module}: error reading PDF file: {detail}")]
    ExtractionFailed { module: usize, detail: String },

    /// The PDF parsed, but contains no text layer.
    #[error("Module {module}: no extractable text")]
    NoText { module: usize },
}

impl DocumentError {
    /// Re-tag an error produced before the module number was known.
    pub fn for_module(self, module: usize) -> Self {
        match self {
            DocumentError::InputFailed { detail, .. } => DocumentError::InputFailed { module, detail },
            DocumentError::ExtractionFailed { detail, .. } => {
                DocumentError::ExtractionFailed { module, detail }
            }
            DocumentError::NoText { .. } => DocumentError::NoText { module },
        }
    }
}

/// A non-fatal error for a single review chunk.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ChunkError {
    /// The generation call failed on every attempt.
    #[error("Chunk {chunk}: max retries exceeded after {attempts} attempts: {detail}")]
    RetriesExhausted {
        chunk: usize,
        attempts: u32,
        detail: String,
    },
}

/// A failed call to the generation service (transport, API, or timeout).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct GenerationError(pub String);
