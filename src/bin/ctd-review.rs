//! CLI binary for ctd-review.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ReviewConfig`, runs one review, and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use ctd_review::config::{DEFAULT_MODEL, DEFAULT_PROVIDER};
use ctd_review::{
    DocumentResult, LlmGenerationService, ProgressCallback, ReportConfig, ReviewConfig,
    ReviewOutput, ReviewProgressCallback, Reviewer,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Number of CTD modules a dossier is made of.
const MODULE_COUNT: usize = 5;

/// Characters shown per module with `--preview`.
const PREVIEW_CHARS: usize = 1000;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Shorten long provider messages so each log line stays on one row.
fn truncate(msg: &str, max: usize) -> String {
    match msg.char_indices().nth(max) {
        Some((idx, _)) => format!("{}\u{2026}", &msg[..idx]),
        None => msg.to_string(),
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner while modules are read, then a bar over
/// chunks with one log line per chunk, retry, or unreadable module.
struct CliProgressCallback {
    bar: ProgressBar,
    chunk_started: Mutex<Option<Instant>>,
    retries: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Reading");
        bar.set_message("Opening modules…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            chunk_started: Mutex::new(None),
            retries: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.chunk_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ReviewProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_documents: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Reading {total_documents} CTD modules…"))
        ));
    }

    fn on_document_extracted(&self, module: usize, chars: usize) {
        self.bar.println(format!(
            "  {} Module {}  {}",
            green("✓"),
            module,
            dim(&format!("{chars:>7} chars"))
        ));
    }

    fn on_document_failed(&self, module: usize, error: &str) {
        self.bar.println(format!(
            "  {} Module {}  {}",
            red("✗"),
            module,
            red(&truncate(error, 100))
        ));
    }

    fn on_review_start(&self, total_chunks: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_chunks as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Reviewing");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Reviewing {total_chunks} chunks…"))
        ));
    }

    fn on_chunk_start(&self, chunk: usize, _total_chunks: usize) {
        if let Ok(mut t) = self.chunk_started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(format!("chunk {chunk}"));
    }

    fn on_retry(&self, chunk: usize, attempt: u32, wait_ms: u64, error: &str) {
        self.retries.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Chunk {:>3}  attempt {} failed: {}  {}",
            yellow("↻"),
            chunk,
            attempt,
            truncate(error, 80),
            dim(&format!("retrying in {:.0}s", wait_ms as f64 / 1000.0)),
        ));
    }

    fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, fragment_len: usize) {
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            chunk,
            total_chunks,
            dim(&format!("{fragment_len:>5} chars")),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_failed(&self, chunk: usize, total_chunks: usize, error: &str) {
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}  {}",
            red("✗"),
            chunk,
            total_chunks,
            red(&truncate(error, 80)),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_review_complete(&self, total_chunks: usize, success_count: usize) {
        let failed = total_chunks.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} chunks reviewed",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} chunks reviewed  ({} skipped, {} retries)",
                if failed == total_chunks {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_chunks,
                red(&failed.to_string()),
                self.retries.load(Ordering::SeqCst),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Review a dossier (one PDF per CTD module, in module order)
  ctd-review m1.pdf m2.pdf m3.pdf m4.pdf m5.pdf \
      --font /usr/share/fonts/truetype/dejavu/DejaVuSans.ttf \
      --output ctd_review_report.pdf

  # Font and output from the environment, preview the extracted text
  export CTD_REVIEW_FONT=/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf
  export CTD_REVIEW_OUTPUT=ctd_review_report.pdf
  ctd-review --preview m1.pdf m2.pdf m3.pdf m4.pdf m5.pdf

  # Another provider and model
  ctd-review --provider openai --model gpt-4.1-mini m1.pdf m2.pdf m3.pdf m4.pdf m5.pdf

  # Machine-readable result
  ctd-review --json m1.pdf m2.pdf m3.pdf m4.pdf m5.pdf > review.json

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  GOOGLE_API_KEY          Accepted for Gemini when GEMINI_API_KEY is unset
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  CTD_REVIEW_FONT         Unicode TrueType font used for the report
  CTD_REVIEW_OUTPUT       Report path (overwritten on every run)
  CTD_REVIEW_PROVIDER     Override provider (gemini, openai, anthropic, ollama, …)
  CTD_REVIEW_MODEL        Override model ID
  RUST_LOG                Tracing filter, e.g. ctd_review=debug

RETRIES:
  Each chunk gets --max-retries attempts. After failed attempt n the client
  waits 2^n × --backoff-ms (2 s, 4 s, 8 s by default). A chunk that fails every
  attempt is left out of the report; the run continues.
"#;

/// Review the five modules of a Common Technical Dossier with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "ctd-review",
    version,
    about = "Review the five modules of a Common Technical Dossier with an LLM",
    long_about = "Extract the text of the five CTD modules (local PDFs or URLs), review it \
chunk by chunk for regulatory compliance with an LLM, and write the review as a PDF report.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// The five module PDFs (paths or HTTP/HTTPS URLs), Module 1 first.
    #[arg(value_name = "MODULE_PDF", num_args = 5, required = true)]
    inputs: Vec<String>,

    /// Unicode TrueType font for the report.
    #[arg(long, env = "CTD_REVIEW_FONT")]
    font: Option<PathBuf>,

    /// Report path; overwritten on every run.
    #[arg(short, long, env = "CTD_REVIEW_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM provider: gemini, openai, anthropic, mistral, ollama, azure.
    #[arg(long, env = "CTD_REVIEW_PROVIDER", default_value = DEFAULT_PROVIDER)]
    provider: String,

    /// LLM model ID.
    #[arg(long, env = "CTD_REVIEW_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Generation attempts per chunk.
    #[arg(long, env = "CTD_REVIEW_MAX_RETRIES", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_retries: u32,

    /// Characters per review chunk.
    #[arg(long, env = "CTD_REVIEW_CHUNK_CHARS", default_value_t = 3000)]
    chunk_chars: usize,

    /// Backoff unit in milliseconds (wait after attempt n is 2^n units).
    #[arg(long, env = "CTD_REVIEW_BACKOFF_MS", default_value_t = 1000)]
    backoff_ms: u64,

    /// Per-call LLM timeout in seconds (0 disables).
    #[arg(long, env = "CTD_REVIEW_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// LLM temperature (0.0–2.0). Provider default when unset.
    #[arg(long, env = "CTD_REVIEW_TEMPERATURE")]
    temperature: Option<f32>,

    /// Max LLM output tokens per chunk. Provider default when unset.
    #[arg(long, env = "CTD_REVIEW_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "CTD_REVIEW_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the first 1000 characters of each extracted module.
    #[arg(long)]
    preview: bool,

    /// Print the review text to stdout.
    #[arg(long)]
    print_review: bool,

    /// Output structured JSON (ReviewOutput) on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "CTD_REVIEW_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CTD_REVIEW_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CTD_REVIEW_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar reports retries and failures itself, so library logs
    // drop to ERROR while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.inputs.len() != MODULE_COUNT {
        anyhow::bail!(
            "Expected {MODULE_COUNT} module PDFs, got {}",
            cli.inputs.len()
        );
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ReviewProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // Missing font, output path, or API key stops us before any module is read.
    config.report.validate().context("Report configuration")?;
    let service = LlmGenerationService::from_config(&config).context("Generation service")?;

    // ── Extract ──────────────────────────────────────────────────────────
    let reviewer = Reviewer::new(service, config);
    let started = Instant::now();
    let documents = reviewer.extract_all(&cli.inputs).await;

    // Previews go out before any chunk is sent, so they show even when the
    // review itself fails.
    if cli.preview && !cli.json {
        let stdout = io::stdout();
        write_previews(&mut stdout.lock(), &documents).context("Failed to write to stdout")?;
    }

    // ── Review and report ────────────────────────────────────────────────
    let output = reviewer
        .review_documents(documents, started)
        .await
        .context("Review failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    if cli.print_review {
        let stdout = io::stdout();
        write_review(&mut stdout.lock(), &output.review).context("Failed to write to stdout")?;
    }

    if !cli.quiet {
        print_summary(&output, show_progress);
    }

    Ok(())
}

/// Map CLI args to `ReviewConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ReviewConfig> {
    let report = ReportConfig {
        font_path: cli.font.clone(),
        output_path: cli.output.clone(),
        ..ReportConfig::default()
    };

    let mut builder = ReviewConfig::builder()
        .provider_name(cli.provider.as_str())
        .model(cli.model.as_str())
        .chunk_chars(cli.chunk_chars)
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.backoff_ms)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .report(report);

    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Write the review, ending with exactly one newline of our own.
fn write_review(out: &mut impl Write, review: &str) -> io::Result<()> {
    out.write_all(review.as_bytes())?;
    if !review.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    out.flush()
}

fn write_previews(out: &mut impl Write, documents: &[DocumentResult]) -> io::Result<()> {
    for doc in documents {
        writeln!(out, "── Module {} ── {}", doc.module, doc.source)?;
        match (doc.preview(PREVIEW_CHARS), &doc.error) {
            (Some(text), _) => {
                writeln!(out, "{text}")?;
                if doc.chars > PREVIEW_CHARS {
                    writeln!(out, "… ({} more characters)", doc.chars - PREVIEW_CHARS)?;
                }
            }
            (None, Some(e)) => writeln!(out, "(not used: {e})")?,
            (None, None) => writeln!(out, "(no text)")?,
        }
        writeln!(out)?;
    }
    Ok(())
}

fn print_summary(output: &ReviewOutput, show_progress: bool) {
    let stats = &output.stats;
    if !show_progress {
        for doc in output.documents.iter().filter(|d| !d.is_usable()) {
            if let Some(ref e) = doc.error {
                eprintln!("{} {}", yellow("⚠"), e);
            }
        }
    }
    eprintln!(
        "{}  {}/{} modules  {}/{} chunks  {}ms  →  {}",
        if stats.failed_chunks == 0 && stats.usable_documents == stats.total_documents {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.usable_documents,
        stats.total_documents,
        stats.reviewed_chunks,
        stats.total_chunks,
        stats.total_duration_ms,
        bold(&output.report_path.display().to_string()),
    );
    eprintln!(
        "   {} chars reviewed  /  {} generation calls",
        dim(&stats.combined_chars.to_string()),
        dim(&stats.total_attempts.to_string()),
    );
}
