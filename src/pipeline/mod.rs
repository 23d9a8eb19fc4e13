//! Pipeline stages for CTD review.
//!
//! Each submodule implements exactly one transformation step and is tested
//! on its own; [`crate::review`] wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ chunk ──▶ llm ──▶ postprocess ──▶ report
//! (path/URL) (text layer) (≤3000) (retry)  (normalise)    (printpdf)
//! ```
//!
//! 1. [`input`]   — read a local file or download a URL, check the `%PDF` magic
//! 2. [`extract`] — pull the text layer; runs in `spawn_blocking` because
//!    the parser is synchronous and may panic on malformed input
//! 3. [`chunk`]   — split the combined text into fixed-size character chunks
//! 4. [`llm`]     — one generation call per chunk with exponential backoff;
//!    the only stage with network I/O besides URL inputs
//! 5. [`postprocess`] — normalise line endings and drop invisible characters
//! 6. [`report`]  — lay the review out on A4 pages and write it atomically;
//!    line widths come from [`font`], the same TTF printpdf embeds

pub mod chunk;
pub mod extract;
pub mod font;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod report;
