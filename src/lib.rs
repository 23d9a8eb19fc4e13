//! # ctd-review
//!
//! Review Common Technical Dossier (CTD) modules with an LLM and render the
//! commentary as a PDF report.
//!
//! A CTD arrives as five PDFs, one per module. This crate pulls the text
//! layer out of each, splits the combined text into fixed-size chunks, asks a
//! generation service to review every chunk for regulatory compliance, and
//! writes the joined review to a paginated PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! 5 × PDF
//!  │
//!  ├─ 1. Input    read local file or download from URL, check %PDF magic
//!  ├─ 2. Extract  text layer via pdf-extract (spawn_blocking); empty → dropped
//!  ├─ 3. Chunk    join with blank lines, split every 3000 characters
//!  ├─ 4. Review   one LLM call per chunk, 3 attempts, 2 s → 4 s → 8 s backoff
//!  ├─ 5. Polish   normalise line endings, drop zero-width characters
//!  └─ 6. Report   A4 pages via printpdf, wrapped on real glyph widths
//! ```
//!
//! Everything is sequential. A module that cannot be read and a chunk that
//! exhausts its retries are logged and skipped; the run only fails when no
//! module is usable, when no chunk is reviewed, or when the report cannot be
//! written.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ctd_review::{review_dossier, ReviewConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // GEMINI_API_KEY (or GOOGLE_API_KEY) must be set in the environment.
//!     let config = ReviewConfig::builder()
//!         .font_path("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf")
//!         .output_path("ctd_review_report.pdf")
//!         .build()?;
//!     let modules = ["m1.pdf", "m2.pdf", "m3.pdf", "m4.pdf", "m5.pdf"];
//!     let output = review_dossier(&modules, &config).await?;
//!     println!("{}", output.review);
//!     Ok(())
//! }
//! ```
//!
//! ## Injecting a Generation Service
//!
//! The review pipeline only needs something that implements
//! [`GenerationService`]. Build it once and hand it to a [`Reviewer`]:
//!
//! ```rust
//! use ctd_review::{GenerationError, GenerationService, ReviewConfig, Reviewer};
//!
//! struct Canned;
//!
//! impl GenerationService for Canned {
//!     async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
//!         Ok("- Section of CTD: Module 3\n- Review Comments: none".into())
//!     }
//! }
//!
//! let reviewer = Reviewer::new(Canned, ReviewConfig::default());
//! let review = tokio_test::block_on(reviewer.review(&["Module 3 text"]));
//! assert!(review.text.contains("Module 3"));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ctd-review` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod review;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ReportConfig, ReviewConfig, ReviewConfigBuilder};
pub use error::{ChunkError, DocumentError, GenerationError, ReviewError};
pub use output::{DocumentResult, FragmentResult, ReviewOutput, ReviewStats, ReviewText};
pub use pipeline::chunk::chunk_text;
pub use pipeline::extract::extract_text;
pub use pipeline::llm::{GenerationService, LlmGenerationService, ReviewClient};
pub use pipeline::report::render_report;
pub use progress::{NoopProgressCallback, ProgressCallback, ReviewProgressCallback};
pub use review::{review_dossier, Reviewer};
