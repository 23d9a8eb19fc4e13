//! Configuration types for a CTD review run.
//!
//! Review behaviour is controlled through [`ReviewConfig`], built via its
//! [`ReviewConfigBuilder`]; report layout and locations live in
//! [`ReportConfig`]. Nothing environment-specific is hardcoded: the report
//! font and output path must be supplied (flag or environment variable) and
//! the provider API key is read from the environment only.

use crate::error::ReviewError;
use crate::pipeline::chunk::REVIEW_CHUNK_CHARS;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the report font path.
pub const FONT_PATH_ENV: &str = "CTD_REVIEW_FONT";

/// Environment variable holding the report output path.
pub const OUTPUT_PATH_ENV: &str = "CTD_REVIEW_OUTPUT";

/// Provider used when none is configured.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Configuration for a review run.
///
/// # Example
/// ```rust
/// use ctd_review::ReviewConfig;
///
/// let config = ReviewConfig::builder()
///     .model("gemini-1.5-pro")
///     .max_retries(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.chunk_chars, 3000);
/// ```
#[derive(Clone)]
pub struct ReviewConfig {
    /// LLM provider name passed to `ProviderFactory`. Default: `gemini`.
    pub provider_name: String,

    /// Model identifier. Default: `gemini-1.5-flash`.
    pub model: String,

    /// Maximum characters per review chunk. Default: 3000.
    pub chunk_chars: usize,

    /// Maximum generation attempts per chunk. Default: 3.
    pub max_retries: u32,

    /// Backoff unit in milliseconds. Attempt `n` failing waits
    /// `2^n × retry_backoff_ms` (2 s, 4 s, 8 s with the default of 1000).
    pub retry_backoff_ms: u64,

    /// Per-generation-call timeout in seconds. A timeout counts as a failed
    /// attempt. Default: 60.
    pub api_timeout_secs: u64,

    /// Sampling temperature. `None` leaves the provider default.
    pub temperature: Option<f32>,

    /// Output token cap per chunk. `None` leaves the provider default.
    pub max_tokens: Option<usize>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Report layout and locations.
    pub report: ReportConfig,

    /// Receives user-visible notifications (retries, failures, progress).
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            provider_name: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            chunk_chars: REVIEW_CHUNK_CHARS,
            max_retries: 3,
            retry_backoff_ms: 1000,
            api_timeout_secs: 60,
            temperature: None,
            max_tokens: None,
            download_timeout_secs: 120,
            report: ReportConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReviewConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewConfig")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("chunk_chars", &self.chunk_chars)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("report", &self.report)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ReviewProgressCallback>"),
            )
            .finish()
    }
}

impl ReviewConfig {
    /// Create a new builder for `ReviewConfig`.
    pub fn builder() -> ReviewConfigBuilder {
        ReviewConfigBuilder {
            config: Self::default(),
        }
    }

    /// Backoff unit as a `Duration`.
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Builder for [`ReviewConfig`].
#[derive(Debug)]
pub struct ReviewConfigBuilder {
    config: ReviewConfig,
}

impl ReviewConfigBuilder {
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn chunk_chars(mut self, n: usize) -> Self {
        self.config.chunk_chars = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn report(mut self, report: ReportConfig) -> Self {
        self.config.report = report;
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.report.font_path = Some(path.into());
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.report.output_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// Report paths are not required here; they are checked when a report is
    /// rendered so that review-only callers need not supply them.
    pub fn build(self) -> Result<ReviewConfig, ReviewError> {
        let c = &self.config;
        if c.chunk_chars == 0 {
            return Err(ReviewError::InvalidConfig(
                "Chunk size must be ≥ 1 character".into(),
            ));
        }
        if c.max_retries == 0 {
            return Err(ReviewError::InvalidConfig(
                "max_retries must be ≥ 1".into(),
            ));
        }
        if c.provider_name.trim().is_empty() {
            return Err(ReviewError::InvalidConfig("Provider name is empty".into()));
        }
        if c.model.trim().is_empty() {
            return Err(ReviewError::InvalidConfig("Model name is empty".into()));
        }
        Ok(self.config)
    }
}

// ── Report configuration ─────────────────────────────────────────────────

/// Layout and locations for the generated PDF report.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Unicode-capable TrueType font. Required.
    pub font_path: Option<PathBuf>,
    /// Where the report is written (overwritten every run). Required.
    pub output_path: Option<PathBuf>,
    /// Document title stored in the PDF info dictionary.
    pub title: String,
    /// Default: 12.
    pub font_size_pt: f32,
    /// Vertical advance per wrapped line. Default: 10.
    pub line_height_mm: f32,
    /// Left/right/top margin. Default: 10.
    pub margin_mm: f32,
    /// A new page starts when the next line would cross this bottom margin. Default: 15.
    pub bottom_margin_mm: f32,
    pub page_width_mm: f32,
    pub page_height_mm: f32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            output_path: None,
            title: "CTD Review Report".to_string(),
            font_size_pt: 12.0,
            line_height_mm: 10.0,
            margin_mm: 10.0,
            bottom_margin_mm: 15.0,
            page_width_mm: 210.0,
            page_height_mm: 297.0,
        }
    }
}

impl ReportConfig {
    /// Report config with both required paths set.
    pub fn new(font_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            font_path: Some(font_path.into()),
            output_path: Some(output_path.into()),
            ..Self::default()
        }
    }

    /// Read the font and output paths from [`FONT_PATH_ENV`] / [`OUTPUT_PATH_ENV`].
    ///
    /// Unset variables leave the corresponding path empty; [`Self::paths`]
    /// reports them.
    pub fn from_env() -> Self {
        let var = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        };
        Self {
            font_path: var(FONT_PATH_ENV),
            output_path: var(OUTPUT_PATH_ENV),
            ..Self::default()
        }
    }

    /// Both required paths, or `MissingConfiguration` naming the first unset one.
    pub fn paths(&self) -> Result<(&Path, &Path), ReviewError> {
        let font = self
            .font_path
            .as_deref()
            .ok_or_else(|| ReviewError::MissingConfiguration {
                key: FONT_PATH_ENV.to_string(),
                hint: "Set --font or CTD_REVIEW_FONT to a Unicode TrueType font (e.g. DejaVuSans.ttf).".into(),
            })?;
        let output = self
            .output_path
            .as_deref()
            .ok_or_else(|| ReviewError::MissingConfiguration {
                key: OUTPUT_PATH_ENV.to_string(),
                hint: "Set --output or CTD_REVIEW_OUTPUT to the report file path.".into(),
            })?;
        Ok((font, output))
    }

    /// Fail fast on missing paths or a missing font file, before any work starts.
    pub fn validate(&self) -> Result<(), ReviewError> {
        let (font, _) = self.paths()?;
        if !font.is_file() {
            return Err(ReviewError::FontNotFound {
                path: font.to_path_buf(),
            });
        }
        if self.font_size_pt <= 0.0 || self.line_height_mm <= 0.0 {
            return Err(ReviewError::InvalidConfig(
                "Font size and line height must be positive".into(),
            ));
        }
        if self.usable_width_mm() <= 0.0 {
            return Err(ReviewError::InvalidConfig(format!(
                "Margins ({} mm) leave no room on a {} mm wide page",
                self.margin_mm, self.page_width_mm
            )));
        }
        Ok(())
    }

    /// Width between the side margins.
    pub fn usable_width_mm(&self) -> f32 {
        self.page_width_mm - 2.0 * self.margin_mm
    }
}

// ── Credentials ──────────────────────────────────────────────────────────

/// Environment variables that can carry the API key for a provider, in
/// lookup order. Empty for providers that need no key.
pub fn api_key_vars(provider: &str) -> &'static [&'static str] {
    match provider.to_ascii_lowercase().as_str() {
        "gemini" | "google" | "vertex" | "vertexai" => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        "openai" => &["OPENAI_API_KEY"],
        "anthropic" => &["ANTHROPIC_API_KEY"],
        "mistral" => &["MISTRAL_API_KEY"],
        "openrouter" => &["OPENROUTER_API_KEY"],
        "azure" => &["AZURE_OPENAI_API_KEY"],
        _ => &[],
    }
}

/// Confirm the provider's API key is present in the environment.
///
/// Any one of [`api_key_vars`] is enough. Models prefixed `vertexai:`
/// authenticate with Google Cloud credentials instead and are not checked.
/// There is no literal fallback: if every variable is unset or empty the
/// result is a `MissingConfiguration` error.
pub fn require_api_key(provider: &str, model: &str) -> Result<(), ReviewError> {
    check_api_key(provider, model, |var| std::env::var(var).ok())
}

fn check_api_key<F>(provider: &str, model: &str, lookup: F) -> Result<(), ReviewError>
where
    F: Fn(&str) -> Option<String>,
{
    let vars = api_key_vars(provider);
    if vars.is_empty() || model.starts_with("vertexai:") {
        return Ok(());
    }
    let found = vars
        .iter()
        .any(|var| lookup(var).is_some_and(|v| !v.trim().is_empty()));
    if found {
        return Ok(());
    }
    let key = vars.join(" or ");
    Err(ReviewError::MissingConfiguration {
        hint: format!(
            "Export {}=<your key> before running a review with provider '{provider}'.",
            vars[0]
        ),
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_review_pipeline() {
        let c = ReviewConfig::default();
        assert_eq!(c.chunk_chars, 3000);
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.provider_name, "gemini");
        assert_eq!(c.model, "gemini-1.5-flash");
        assert_eq!(c.backoff_unit(), Duration::from_secs(1));
    }

    #[test]
    fn builder_rejects_zero_chunk() {
        let err = ReviewConfig::builder().chunk_chars(0).build().unwrap_err();
        assert!(matches!(err, ReviewError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_retries() {
        assert!(ReviewConfig::builder().max_retries(0).build().is_err());
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = ReviewConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, Some(2.0));
    }

    #[test]
    fn report_paths_missing_font_first() {
        let err = ReportConfig::default().paths().unwrap_err();
        match err {
            ReviewError::MissingConfiguration { key, .. } => assert_eq!(key, FONT_PATH_ENV),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn report_paths_missing_output() {
        let cfg = ReportConfig {
            font_path: Some("font.ttf".into()),
            ..ReportConfig::default()
        };
        match cfg.paths().unwrap_err() {
            ReviewError::MissingConfiguration { key, .. } => assert_eq!(key, OUTPUT_PATH_ENV),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn validate_reports_absent_font_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ReportConfig::new(dir.path().join("nope.ttf"), dir.path().join("out.pdf"));
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ReviewError::FontNotFound { .. }
        ));
    }

    #[test]
    fn provider_key_vars() {
        assert_eq!(api_key_vars("gemini"), ["GEMINI_API_KEY", "GOOGLE_API_KEY"]);
        assert_eq!(api_key_vars("VertexAI"), ["GEMINI_API_KEY", "GOOGLE_API_KEY"]);
        assert_eq!(api_key_vars("OpenAI"), ["OPENAI_API_KEY"]);
        assert!(api_key_vars("ollama").is_empty());
    }

    #[test]
    fn keyless_provider_needs_no_env() {
        assert!(require_api_key("ollama", "llama3").is_ok());
    }

    #[test]
    fn google_api_key_alone_is_enough_for_gemini() {
        let only_google = |var: &str| (var == "GOOGLE_API_KEY").then(|| "k".to_string());
        for provider in ["gemini", "google", "vertex", "vertexai"] {
            assert!(check_api_key(provider, "gemini-1.5-flash", only_google).is_ok(), "{provider}");
        }
    }

    #[test]
    fn missing_gemini_key_names_both_vars() {
        let blank = |_: &str| Some("  ".to_string());
        match check_api_key("vertex", "gemini-1.5-flash", blank).unwrap_err() {
            ReviewError::MissingConfiguration { key, .. } => {
                assert_eq!(key, "GEMINI_API_KEY or GOOGLE_API_KEY")
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn vertexai_models_skip_the_key_check() {
        assert!(check_api_key("vertexai", "vertexai:gemini-1.5-pro", |_| None).is_ok());
    }

    #[test]
    fn openai_key_is_still_required() {
        assert!(check_api_key("openai", "gpt-4o", |_| None).is_err());
    }
}
