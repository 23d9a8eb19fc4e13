//! Text extraction: PDF bytes → page text via `pdf-extract`.
//!
//! Only the embedded text layer is read; scanned modules without one come
//! back empty and are dropped like a failed extraction. `pdf-extract` panics
//! on some malformed input (bad font CMaps, missing descendant fonts), so
//! [`extract_text`] catches the unwind and reports it as a failed module.
//! Parsing is CPU-bound; the async entry point runs it on the blocking pool.

use crate::error::DocumentError;
use crate::output::DocumentResult;
use crate::pipeline::input;
use crate::progress::ProgressCallback;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, info};

/// Extract the text of every page, pages joined by a newline.
///
/// Any parser error or panic (corrupt file, encryption, unsupported
/// encoding) is an `ExtractionFailed`; the module number is left at 0 for
/// the caller to set.
pub fn extract_text(pdf_bytes: &[u8]) -> Result<String, DocumentError> {
    let parsed = catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
    }))
    .map_err(|panic| DocumentError::ExtractionFailed {
        module: 0,
        detail: format!("PDF parser panicked: {}", panic_message(panic.as_ref())),
    })?;
    let pages = parsed.map_err(|e| DocumentError::ExtractionFailed {
        module: 0,
        detail: e.to_string(),
    })?;
    debug!("Extracted {} pages", pages.len());
    Ok(pages.join("\n"))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// [`extract_text`] on the blocking pool.
pub async fn extract_text_blocking(pdf_bytes: Vec<u8>) -> Result<String, DocumentError> {
    tokio::task::spawn_blocking(move || extract_text(&pdf_bytes))
        .await
        .map_err(|e| DocumentError::ExtractionFailed {
            module: 0,
            detail: format!("Extraction task failed: {e}"),
        })?
}

/// Resolve and extract one CTD module.
///
/// Never fails the run: problems are logged, reported through `progress`,
/// and recorded in the returned [`DocumentResult`].
pub async fn extract_document(
    module: usize,
    source: &str,
    download_timeout_secs: u64,
    progress: Option<&ProgressCallback>,
) -> DocumentResult {
    let outcome = match input::resolve_input(source, download_timeout_secs).await {
        Ok(pdf) => extract_text_blocking(pdf.bytes).await.and_then(|text| {
            if text.trim().is_empty() {
                Err(DocumentError::NoText { module })
            } else {
                Ok(text)
            }
        }),
        Err(e) => Err(DocumentError::InputFailed {
            module,
            detail: e.to_string(),
        }),
    };

    match outcome {
        Ok(text) => {
            let chars = text.chars().count();
            info!("Module {}: extracted {} characters", module, chars);
            if let Some(cb) = progress {
                cb.on_document_extracted(module, chars);
            }
            DocumentResult {
                module,
                source: source.to_string(),
                text: Some(text),
                chars,
                error: None,
            }
        }
        Err(e) => {
            let e = e.for_module(module);
            error!("{}", e);
            if let Some(cb) = progress {
                cb.on_document_failed(module, &e.to_string());
            }
            DocumentResult {
                module,
                source: source.to_string(),
                text: None,
                chars: 0,
                error: Some(e),
            }
        }
    }
}
