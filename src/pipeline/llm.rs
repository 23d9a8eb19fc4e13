//! Generation-service access and the retrying review client.
//!
//! [`GenerationService`] is the seam between the review pipeline and the
//! outside world: one prompt in, one completion out. The production
//! implementation, [`LlmGenerationService`], is built once at startup from an
//! `edgequake-llm` provider and handed to the pipeline; tests hand in stubs.
//!
//! ## Retry Strategy
//!
//! [`ReviewClient`] makes at most `max_retries` attempts per chunk. After
//! failed attempt `n` (1-based) it waits `2^n × backoff_unit`, so with the
//! default one-second unit the waits are 2 s → 4 s → 8 s. When every attempt
//! fails the chunk yields no fragment; it never aborts the batch.

use crate::config::{require_api_key, ReviewConfig};
use crate::error::{ChunkError, GenerationError, ReviewError};
use crate::output::FragmentResult;
use crate::progress::ProgressCallback;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// One text completion call.
pub trait GenerationService: Send + Sync {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, GenerationError>> + Send;
}

impl<T: GenerationService> GenerationService for Arc<T> {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, GenerationError>> + Send {
        (**self).generate(prompt)
    }
}

/// [`GenerationService`] backed by an `edgequake-llm` provider.
pub struct LlmGenerationService {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmGenerationService {
    /// Wrap an already-constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ReviewConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }

    /// Construct the provider named in `config`.
    ///
    /// The API key is read from the environment only; an unset key is a
    /// `MissingConfiguration` error.
    pub fn from_config(config: &ReviewConfig) -> Result<Self, ReviewError> {
        require_api_key(&config.provider_name, &config.model)?;
        let provider = ProviderFactory::create_llm_provider(&config.provider_name, &config.model)
            .map_err(|e| ReviewError::ProviderNotConfigured {
                provider: config.provider_name.clone(),
                hint: format!("{e}"),
            })?;
        info!(
            "Generation service: {} / {}",
            config.provider_name, config.model
        );
        Ok(Self::new(provider, config))
    }
}

impl GenerationService for LlmGenerationService {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let messages = vec![ChatMessage::user(prompt)];
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| GenerationError(e.to_string()))?;
        debug!(
            "{} prompt tokens, {} completion tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Build `CompletionOptions` from the review config.
fn build_options(config: &ReviewConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        ..Default::default()
    }
}

/// Wait after failed attempt `attempt` (1-based): `2^attempt × unit`.
pub fn backoff_delay(attempt: u32, unit: Duration) -> Duration {
    unit.saturating_mul(2u32.saturating_pow(attempt))
}

/// Calls a [`GenerationService`] with bounded exponential-backoff retry.
pub struct ReviewClient<S> {
    service: S,
    max_retries: u32,
    backoff_unit: Duration,
    call_timeout: Option<Duration>,
    progress: Option<ProgressCallback>,
}

impl<S: GenerationService> ReviewClient<S> {
    pub fn new(service: S, config: &ReviewConfig) -> Self {
        Self {
            service,
            max_retries: config.max_retries,
            backoff_unit: config.backoff_unit(),
            call_timeout: (config.api_timeout_secs > 0)
                .then(|| Duration::from_secs(config.api_timeout_secs)),
            progress: config.progress_callback.clone(),
        }
    }

    /// Override the per-call timeout (`None` disables it).
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Review one prompt; `None` when every attempt failed or the reply was empty.
    pub async fn review(&self, prompt: &str) -> Option<String> {
        self.review_chunk(1, prompt).await.fragment().map(String::from)
    }

    /// Review one chunk, recording attempts, timing, and the final error.
    pub async fn review_chunk(&self, chunk: usize, prompt: &str) -> FragmentResult {
        let start = Instant::now();
        let mut last_err: Option<GenerationError> = None;

        for attempt in 1..=self.max_retries {
            match self.call(prompt).await {
                Ok(text) => {
                    let text = text.trim().to_string();
                    debug!(
                        "Chunk {}: {} chars after {} attempt(s), {:?}",
                        chunk,
                        text.len(),
                        attempt,
                        start.elapsed()
                    );
                    return FragmentResult {
                        chunk,
                        text,
                        attempts: attempt,
                        duration_ms: start.elapsed().as_millis() as u64,
                        error: None,
                    };
                }
                Err(e) => {
                    let wait = backoff_delay(attempt, self.backoff_unit);
                    warn!(
                        "Chunk {}: error with generation service: {}. Retrying in {:?}...",
                        chunk, e, wait
                    );
                    if let Some(ref cb) = self.progress {
                        cb.on_retry(chunk, attempt, wait.as_millis() as u64, &e.0);
                    }
                    sleep(wait).await;
                    last_err = Some(e);
                }
            }
        }

        let detail = last_err
            .map(|e| e.0)
            .unwrap_or_else(|| "no attempts were made".to_string());
        error!("Chunk {}: max retries exceeded: {}", chunk, detail);

        FragmentResult {
            chunk,
            text: String::new(),
            attempts: self.max_retries,
            duration_ms: start.elapsed().as_millis() as u64,
            error: Some(ChunkError::RetriesExhausted {
                chunk,
                attempts: self.max_retries,
                detail,
            }),
        }
    }

    async fn call(&self, prompt: &str) -> Result<String, GenerationError> {
        match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, self.service.generate(prompt))
                .await
                .unwrap_or_else(|_| {
                    Err(GenerationError(format!(
                        "call timed out after {}s",
                        limit.as_secs_f32()
                    )))
                }),
            None => self.service.generate(prompt).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ReviewProgressCallback;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays scripted replies, then fails forever.
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, GenerationError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(replies: Vec<Result<&str, &str>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(String::from).map_err(|e| GenerationError(e.into())))
                        .collect(),
                ),
                calls: AtomicU32::new(0),
            }
        }
    }

    impl GenerationService for Scripted {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError("503 Service Unavailable".into())))
        }
    }

    struct Hangs;

    impl GenerationService for Hangs {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            sleep(Duration::from_secs(30)).await;
            Ok("too late".into())
        }
    }

    #[derive(Default)]
    struct Waits(Mutex<Vec<u64>>);

    impl ReviewProgressCallback for Waits {
        fn on_retry(&self, _chunk: usize, _attempt: u32, wait_ms: u64, _error: &str) {
            self.0.lock().unwrap().push(wait_ms);
        }
    }

    fn fast_config() -> ReviewConfig {
        ReviewConfig::builder().retry_backoff_ms(1).build().unwrap()
    }

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&ReviewConfig::default());
        assert_eq!(opts.temperature, None);
        assert_eq!(opts.max_tokens, None);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let unit = Duration::from_secs(1);
        assert_eq!(backoff_delay(1, unit), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, unit), Duration::from_secs(4));
        assert_eq!(backoff_delay(3, unit), Duration::from_secs(8));
    }

    #[test]
    fn backoff_saturates() {
        assert_eq!(backoff_delay(1, Duration::MAX), Duration::MAX);
    }

    #[test]
    fn first_success_returns_trimmed_text() {
        let client = ReviewClient::new(Scripted::new(vec![Ok("  review text \n")]), &fast_config());
        let text = tokio_test::block_on(client.review("prompt"));
        assert_eq!(text.as_deref(), Some("review text"));
        assert_eq!(client.service().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let client = ReviewClient::new(
            Scripted::new(vec![Err("429"), Err("500"), Ok("ok")]),
            &fast_config(),
        );
        let result = client.review_chunk(4, "prompt").await;
        assert_eq!(result.fragment(), Some("ok"));
        assert_eq!(result.attempts, 3);
        assert_eq!(result.chunk, 4);
    }

    #[tokio::test]
    async fn always_failing_service_stops_at_max_retries() {
        let waits = Arc::new(Waits::default());
        let config = ReviewConfig::builder()
            .retry_backoff_ms(1)
            .progress_callback(waits.clone())
            .build()
            .unwrap();
        let client = ReviewClient::new(Scripted::new(vec![]), &config);

        assert_eq!(client.review("prompt").await, None);
        assert_eq!(client.service().calls.load(Ordering::SeqCst), 3);
        assert_eq!(*waits.0.lock().unwrap(), vec![2, 4, 8]);
    }

    #[tokio::test]
    async fn exhausted_chunk_carries_last_error() {
        let client = ReviewClient::new(
            Scripted::new(vec![Err("first"), Err("second"), Err("last")]),
            &fast_config(),
        );
        let result = client.review_chunk(2, "prompt").await;
        match result.error {
            Some(ChunkError::RetriesExhausted { chunk, attempts, detail }) => {
                assert_eq!(chunk, 2);
                assert_eq!(attempts, 3);
                assert_eq!(detail, "last");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(result.text.is_empty());
    }

    #[tokio::test]
    async fn empty_reply_is_absent() {
        let client = ReviewClient::new(Scripted::new(vec![Ok("   ")]), &fast_config());
        assert_eq!(client.review("prompt").await, None);
    }

    #[tokio::test]
    async fn timeout_counts_as_failed_attempt() {
        let config = ReviewConfig::builder()
            .retry_backoff_ms(1)
            .max_retries(2)
            .build()
            .unwrap();
        let client = ReviewClient::new(Hangs, &config)
            .with_call_timeout(Some(Duration::from_millis(10)));
        let result = client.review_chunk(1, "prompt").await;
        match result.error {
            Some(ChunkError::RetriesExhausted { detail, .. }) => {
                assert!(detail.contains("timed out"), "got: {detail}")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
