//! Review orchestration: documents → chunks → fragments → report.
//!
//! [`Reviewer`] owns the injected generation service (wrapped in a
//! [`ReviewClient`]) and the run configuration. Everything runs in sequence:
//! modules are extracted one after another and chunks are reviewed one at a
//! time, so fragments come back in submission order without any sorting.
//!
//! Failures below the run level are absorbed: an unreadable module is dropped
//! from the combined text, and a chunk that exhausts its retries contributes
//! no fragment. Only "nothing to review", "nothing reviewed", and report
//! failures abort a run.

use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::output::{DocumentResult, ReviewOutput, ReviewStats, ReviewText};
use crate::pipeline::chunk::chunk_text;
use crate::pipeline::extract::extract_document;
use crate::pipeline::llm::{GenerationService, LlmGenerationService, ReviewClient};
use crate::pipeline::report::render_report_async;
use crate::prompts::review_prompt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Separator between module texts and between review fragments.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Runs reviews against one generation service.
pub struct Reviewer<S> {
    client: ReviewClient<S>,
    config: ReviewConfig,
}

impl<S: GenerationService> Reviewer<S> {
    /// Build a reviewer around a service constructed once by the caller.
    pub fn new(service: S, config: ReviewConfig) -> Self {
        Self {
            client: ReviewClient::new(service, &config),
            config,
        }
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    pub fn client(&self) -> &ReviewClient<S> {
        &self.client
    }

    /// Review already-extracted module texts.
    ///
    /// Texts are joined with a blank line, split into `chunk_chars` chunks,
    /// and each chunk is reviewed in order. Chunks that fail or come back
    /// empty are skipped; the rest are joined with a blank line. An empty
    /// input list yields an empty review without calling the service.
    pub async fn review<T: AsRef<str>>(&self, texts: &[T]) -> ReviewText {
        let combined = combine_texts(texts);
        let chunks = chunk_text(&combined, self.config.chunk_chars);
        let total = chunks.len();
        info!(
            "Reviewing {} characters in {} chunks of ≤{}",
            combined.chars().count(),
            total,
            self.config.chunk_chars
        );

        let progress = self.config.progress_callback.as_ref();
        if let Some(cb) = progress {
            cb.on_review_start(total);
        }

        let mut fragments = Vec::with_capacity(total);
        for (i, chunk) in chunks.iter().enumerate() {
            let n = i + 1;
            if let Some(cb) = progress {
                cb.on_chunk_start(n, total);
            }

            let result = self.client.review_chunk(n, &review_prompt(chunk)).await;

            if let Some(cb) = progress {
                match (&result.error, result.fragment()) {
                    (Some(e), _) => cb.on_chunk_failed(n, total, &e.to_string()),
                    (None, Some(text)) => cb.on_chunk_complete(n, total, text.len()),
                    (None, None) => debug!("Chunk {}: empty reply, skipped", n),
                }
            }
            fragments.push(result);
        }

        let text = fragments
            .iter()
            .filter_map(|f| f.fragment())
            .collect::<Vec<_>>()
            .join(BLOCK_SEPARATOR);

        let succeeded = fragments.iter().filter(|f| f.fragment().is_some()).count();
        if let Some(cb) = progress {
            cb.on_review_complete(total, succeeded);
        }
        if succeeded < total {
            warn!("{}/{} chunks produced no review", total - succeeded, total);
        }

        ReviewText { text, fragments }
    }

    /// Read and extract each source in order. Never fails; see [`DocumentResult::error`].
    ///
    /// This is the first stage of a run and fires `on_run_start`.
    pub async fn extract_all<T: AsRef<str>>(&self, sources: &[T]) -> Vec<DocumentResult> {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_start(sources.len());
        }
        let mut documents = Vec::with_capacity(sources.len());
        for (i, source) in sources.iter().enumerate() {
            documents.push(
                extract_document(
                    i + 1,
                    source.as_ref(),
                    self.config.download_timeout_secs,
                    self.config.progress_callback.as_ref(),
                )
                .await,
            );
        }
        documents
    }

    /// Full run: extract, review, render the report.
    ///
    /// # Errors
    /// - report configuration missing or font absent (checked before any work)
    /// - `NoUsableDocuments` when every module was dropped
    /// - `EmptyReview` when no chunk produced a fragment
    /// - report rendering / writing failures
    pub async fn run<T: AsRef<str>>(&self, sources: &[T]) -> Result<ReviewOutput, ReviewError> {
        let started = Instant::now();
        self.config.report.validate()?;
        let documents = self.extract_all(sources).await;
        self.review_documents(documents, started).await
    }

    /// Second half of [`run`](Self::run): review documents returned by
    /// [`extract_all`](Self::extract_all) and render the report.
    ///
    /// `started` is when extraction began; stats time the extract stage up
    /// to this call and the whole run from `started`.
    ///
    /// # Errors
    /// Same as [`run`](Self::run).
    pub async fn review_documents(
        &self,
        documents: Vec<DocumentResult>,
        started: Instant,
    ) -> Result<ReviewOutput, ReviewError> {
        let extract_duration_ms = started.elapsed().as_millis() as u64;
        self.config.report.validate()?;

        let texts: Vec<&str> = documents
            .iter()
            .filter_map(|d| d.text.as_deref())
            .collect();
        if texts.is_empty() {
            let first_error = documents
                .iter()
                .find_map(|d| d.error.as_ref())
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no documents were supplied".to_string());
            return Err(ReviewError::NoUsableDocuments {
                total: documents.len(),
                first_error,
            });
        }
        info!("{}/{} modules usable", texts.len(), documents.len());
        let combined_chars = combine_texts(&texts).chars().count();

        // ── Step 2: Review ───────────────────────────────────────────────
        let review_start = Instant::now();
        let review = self.review(&texts).await;
        let review_duration_ms = review_start.elapsed().as_millis() as u64;

        if review.is_empty() {
            return Err(ReviewError::EmptyReview {
                chunks: review.fragments.len(),
                retries: self.config.max_retries,
            });
        }

        // ── Step 3: Report ───────────────────────────────────────────────
        let report_start = Instant::now();
        let report_path = render_report_async(review.text.clone(), self.config.report.clone()).await?;
        let report_duration_ms = report_start.elapsed().as_millis() as u64;

        let reviewed = review.fragments.iter().filter(|f| f.fragment().is_some()).count();
        let stats = ReviewStats {
            total_documents: documents.len(),
            usable_documents: texts.len(),
            combined_chars,
            total_chunks: review.fragments.len(),
            reviewed_chunks: reviewed,
            failed_chunks: review.failed_chunks(),
            total_attempts: review.fragments.iter().map(|f| f.attempts as u64).sum(),
            extract_duration_ms,
            review_duration_ms,
            report_duration_ms,
            total_duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "Review complete: {}/{} chunks, {}ms total → {}",
            stats.reviewed_chunks,
            stats.total_chunks,
            stats.total_duration_ms,
            report_path.display()
        );

        Ok(ReviewOutput {
            review: review.text,
            report_path,
            documents,
            fragments: review.fragments,
            stats,
        })
    }
}

/// Join module texts with a blank line.
pub fn combine_texts<T: AsRef<str>>(texts: &[T]) -> String {
    texts
        .iter()
        .map(|t| t.as_ref())
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// Review a dossier with the provider named in `config`.
///
/// Builds the generation service from the environment (API key required),
/// then performs a full [`Reviewer::run`].
pub async fn review_dossier<T: AsRef<str>>(
    sources: &[T],
    config: &ReviewConfig,
) -> Result<ReviewOutput, ReviewError> {
    config.report.validate()?;
    let service = LlmGenerationService::from_config(config)?;
    Reviewer::new(service, config.clone()).run(sources).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use std::sync::Mutex;

    /// Answers each prompt with "F<n>" and records what it was sent.
    #[derive(Default)]
    struct Numbered {
        prompts: Mutex<Vec<String>>,
    }

    impl GenerationService for Numbered {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            Ok(format!("F{}\n", prompts.len()))
        }
    }

    /// Fails only for prompts containing the marker.
    struct FailsOn(&'static str);

    impl GenerationService for FailsOn {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            if prompt.contains(self.0) {
                Err(GenerationError("quota exceeded".into()))
            } else {
                Ok("ok".into())
            }
        }
    }

    fn config(chunk_chars: usize) -> ReviewConfig {
        ReviewConfig::builder()
            .chunk_chars(chunk_chars)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    #[test]
    fn combine_uses_blank_line() {
        assert_eq!(combine_texts(&["a", "b", "c"]), "a\n\nb\n\nc");
        assert_eq!(combine_texts::<&str>(&[]), "");
    }

    #[tokio::test]
    async fn empty_document_list_is_empty_review() {
        let reviewer = Reviewer::new(Numbered::default(), config(3000));
        let review = reviewer.review::<&str>(&[]).await;
        assert!(review.is_empty());
        assert!(review.fragments.is_empty());
        assert!(reviewer.client().service().prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fragments_joined_in_chunk_order() {
        let reviewer = Reviewer::new(Numbered::default(), config(4));
        // "aaaa\n\nbb" → ["aaaa", "\n\nbb"]; "cccc" is the third chunk.
        let review = reviewer.review(&["aaaa", "bbcccc"]).await;
        assert_eq!(review.fragments.len(), 3);
        assert_eq!(review.text, "F1\n\nF2\n\nF3");

        let prompts = reviewer.client().service().prompts.lock().unwrap();
        assert!(prompts[0].contains("Content:\naaaa\n"));
        assert!(prompts[2].contains("Content:\ncccc\n"));
    }

    #[tokio::test]
    async fn failed_chunk_is_skipped_not_fatal() {
        let reviewer = Reviewer::new(FailsOn("BAD"), config(3));
        let review = reviewer.review(&["okkBADokk"]).await;
        assert_eq!(review.fragments.len(), 3);
        assert_eq!(review.failed_chunks(), 1);
        assert_eq!(review.text, "ok\n\nok");
    }

    #[tokio::test]
    async fn reviewing_only_failed_documents_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let font = dir.path().join("font.ttf");
        std::fs::write(&font, b"placeholder").unwrap();
        let cfg = ReviewConfig::builder()
            .font_path(&font)
            .output_path(dir.path().join("out.pdf"))
            .build()
            .unwrap();
        let reviewer = Reviewer::new(Numbered::default(), cfg);
        let documents = vec![DocumentResult {
            module: 1,
            source: "m1.pdf".into(),
            text: None,
            chars: 0,
            error: Some(crate::error::DocumentError::NoText { module: 1 }),
        }];

        let err = reviewer
            .review_documents(documents, Instant::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::NoUsableDocuments { total: 1, .. }), "got: {err}");
        assert!(reviewer.client().service().prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_without_report_config_fails_fast() {
        let reviewer = Reviewer::new(Numbered::default(), config(3000));
        let err = reviewer.run(&["m1.pdf"]).await.unwrap_err();
        assert!(matches!(err, ReviewError::MissingConfiguration { .. }), "got: {err}");
        assert!(reviewer.client().service().prompts.lock().unwrap().is_empty());
    }
}
