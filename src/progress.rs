//! Progress-callback trait for review-run events.
//!
//! Inject an [`Arc<dyn ReviewProgressCallback>`] via
//! [`crate::config::ReviewConfigBuilder::progress_callback`] to receive the
//! user-visible notifications of a run: documents that could not be read,
//! retry warnings, chunks given up on, and overall progress.
//!
//! # Example
//!
//! ```rust
//! use ctd_review::{ReviewConfig, ReviewProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RetryCounter {
//!     retries: AtomicUsize,
//! }
//!
//! impl ReviewProgressCallback for RetryCounter {
//!     fn on_retry(&self, chunk: usize, attempt: u32, wait_ms: u64, error: &str) {
//!         self.retries.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("chunk {chunk}: {error}. Retrying in {wait_ms}ms (attempt {attempt})");
//!     }
//! }
//!
//! let counter = Arc::new(RetryCounter { retries: AtomicUsize::new(0) });
//! let config = ReviewConfig::builder()
//!     .progress_callback(counter as Arc<dyn ReviewProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the review pipeline as it works through documents and chunks.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Module numbers and chunk indices are 1-based.
pub trait ReviewProgressCallback: Send + Sync {
    /// Called once before the first document is read.
    fn on_run_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// A module's text was extracted.
    fn on_document_extracted(&self, module: usize, chars: usize) {
        let _ = (module, chars);
    }

    /// A module could not be used; it is dropped from the combined text.
    fn on_document_failed(&self, module: usize, error: &str) {
        let _ = (module, error);
    }

    /// Called once the combined text has been chunked.
    fn on_review_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Just before a chunk's first generation attempt.
    fn on_chunk_start(&self, chunk: usize, total_chunks: usize) {
        let _ = (chunk, total_chunks);
    }

    /// A generation attempt failed; the client waits `wait_ms` before continuing.
    fn on_retry(&self, chunk: usize, attempt: u32, wait_ms: u64, error: &str) {
        let _ = (chunk, attempt, wait_ms, error);
    }

    /// A chunk produced a review fragment.
    fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, fragment_len: usize) {
        let _ = (chunk, total_chunks, fragment_len);
    }

    /// A chunk exhausted its retries; its fragment is omitted.
    fn on_chunk_failed(&self, chunk: usize, total_chunks: usize, error: &str) {
        let _ = (chunk, total_chunks, error);
    }

    /// Called once after every chunk has been attempted.
    fn on_review_complete(&self, total_chunks: usize, success_count: usize) {
        let _ = (total_chunks, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ReviewProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReviewConfig`].
pub type ProgressCallback = Arc<dyn ReviewProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        failed_docs: AtomicUsize,
        retries: Mutex<Vec<(usize, u32, u64)>>,
        completed: AtomicUsize,
    }

    impl ReviewProgressCallback for Recorder {
        fn on_document_failed(&self, _module: usize, _error: &str) {
            self.failed_docs.fetch_add(1, Ordering::SeqCst);
        }

        fn on_retry(&self, chunk: usize, attempt: u32, wait_ms: u64, _error: &str) {
            self.retries.lock().unwrap().push((chunk, attempt, wait_ms));
        }

        fn on_chunk_complete(&self, _chunk: usize, _total: usize, _len: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(5);
        cb.on_document_extracted(1, 100);
        cb.on_document_failed(2, "corrupt");
        cb.on_review_start(3);
        cb.on_chunk_start(1, 3);
        cb.on_retry(1, 1, 2000, "503");
        cb.on_chunk_complete(1, 3, 42);
        cb.on_chunk_failed(2, 3, "exhausted");
        cb.on_review_complete(3, 2);
    }

    #[test]
    fn recorder_receives_events() {
        let rec = Recorder::default();
        rec.on_document_failed(3, "bad");
        rec.on_retry(1, 1, 2000, "timeout");
        rec.on_retry(1, 2, 4000, "timeout");
        rec.on_chunk_complete(1, 1, 10);

        assert_eq!(rec.failed_docs.load(Ordering::SeqCst), 1);
        assert_eq!(
            *rec.retries.lock().unwrap(),
            vec![(1, 1, 2000), (1, 2, 4000)]
        );
        assert_eq!(rec.completed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_review_start(10);
        cb.on_chunk_start(1, 10);
    }
}
