//! CLI binary for edgequake-web2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_web2pdf::config::WORKSHOP_SELECTOR;
use edgequake_web2pdf::pipeline::retry::{
    DEFAULT_RETRY_DELAY_MS, INTERACTIVE_BACKOFF_FACTOR, INTERACTIVE_BASE_DELAY_MS,
};
use edgequake_web2pdf::storage::blob_name;
use edgequake_web2pdf::{
    convert, BatchProgressCallback, BatchReport, BatchSummary, BlobStore, ConversionConfig,
    ConversionMode, DirectoryBlobStore, HttpBlobStore, Margins, OutputOptions, PageFormat,
    RenderOutcome, RetryPolicy, Target, Web2PdfError,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use url::Url;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner while Chrome starts and the seed page is
/// crawled, then a bar with one log line per finished URL.
struct CliProgressCallback {
    bar: ProgressBar,
    item_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Starting Chrome…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Self {
            bar,
            item_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        }
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self) -> f64 {
        self.item_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Clear the bar if the run ended before `on_batch_complete`.
    fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total} page(s)…"))
        ));
    }

    fn on_item_start(&self, _current: usize, _total: usize, url: &str) {
        if let Ok(mut t) = self.item_started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(url.to_string());
    }

    fn on_item_complete(&self, current: usize, total: usize, url: &str, outcome: &RenderOutcome) {
        let elapsed = dim(&format!("{:.1}s", self.elapsed_secs()));
        if outcome.is_success() {
            let size = outcome.pdf_bytes.as_ref().map_or(0, Vec::len);
            self.bar.println(format!(
                "  {} {:>3}/{:<3}  {}  {}  {}",
                green("✓"),
                current,
                total,
                url,
                dim(&format!("{:>6} KB", size / 1024)),
                elapsed,
            ));
        } else {
            self.errors.fetch_add(1, Ordering::SeqCst);
            let error = outcome.error_message().unwrap_or_default();
            let msg = if error.chars().count() > 80 {
                format!("{}\u{2026}", error.chars().take(79).collect::<String>())
            } else {
                error
            };
            self.bar.println(format!(
                "  {} {:>3}/{:<3}  {}  {}  {}",
                red("✗"),
                current,
                total,
                url,
                red(&msg),
                elapsed,
            ));
        }
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        self.bar.finish_and_clear();

        if summary.failed == 0 {
            eprintln!(
                "{} {} page(s) rendered successfully",
                green("✔"),
                bold(&summary.successful.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} page(s) rendered  ({} failed)",
                if summary.failed == summary.total {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&summary.successful.to_string()),
                summary.total,
                red(&self.errors.load(Ordering::SeqCst).to_string()),
            );
        }
    }
}

/// Progress sink used with `--no-progress`, `--quiet` and `--json`.
struct SilentProgress;

impl BatchProgressCallback for SilentProgress {}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Crawl a documentation site and merge it into one PDF
  web2pdf -u https://docs.example.com/guide/

  # One page only, named after its title
  web2pdf -u https://example.com/blog/post -m single

  # An AWS workshop, navigation menu only, into a chosen file
  web2pdf -u https://catalog.workshops.aws/abc/en-US -m workshop -o abc.pdf

  # A list of URLs, one PDF each, plus a merged copy
  web2pdf --url-file urls.txt --merge

  # Letter paper, landscape, wider margins, no header/footer
  web2pdf -u https://example.com --format Letter --landscape --margin "1cm 2cm" --no-header-footer

  # Publish the result and print the summary as JSON
  web2pdf -u https://example.com -m single --upload-url https://uploads.example.com \
          --public-url https://cdn.example.com --json

URL FILE FORMAT:
  One URL per line. Blank lines and lines starting with # are ignored.
  Lines that are not absolute http(s) URLs are reported and skipped.

OUTPUT LAYOUT:
  several URLs         output/batch_YYYYMMDD_HHMMSS/<title>.pdf + batch_summary.json
  one URL, single      output/<title>.pdf
  one URL, multi       output/<host>_complete_YYYY-MM-DD.pdf + batch_summary.json

ENVIRONMENT VARIABLES:
  WEB2PDF_*            Every flag has one, e.g. WEB2PDF_WAIT=5000
  WEB2PDF_CHROME       Path to Chrome/Chromium (same as --chrome)
  RUST_LOG             Override log filtering (e.g. RUST_LOG=edgequake_web2pdf=debug)

REQUIREMENTS:
  A local Chrome or Chromium. It is searched on PATH unless --chrome is given.
  Inside containers running as root, add --no-sandbox.
"#;

/// Convert web pages and documentation sites to PDF with headless Chrome.
#[derive(Parser, Debug)]
#[command(
    name = "web2pdf",
    version,
    about = "Convert web pages and documentation sites to PDF with headless Chrome",
    long_about = "Render web pages to PDF with headless Chrome. Renders a single page, crawls \
a site's navigation links and merges them into one document, or converts a list of URLs into \
a directory of PDFs with a JSON summary. Pages are scrolled to the bottom before printing so \
lazy-loaded content is included, and failed pages are retried.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// URL to convert (or crawl, in multi/workshop mode).
    #[arg(short, long, env = "WEB2PDF_URL")]
    url: Option<String>,

    /// File with one URL per line; always runs as a batch.
    #[arg(long, env = "WEB2PDF_URL_FILE")]
    url_file: Option<PathBuf>,

    /// Output PDF file (single/crawl) or directory (batch).
    #[arg(short, long, env = "WEB2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// What to do with a single URL.
    #[arg(short, long, env = "WEB2PDF_MODE", value_enum, default_value = "multi")]
    mode: ModeArg,

    /// CSS selector for navigation links [default: a, or "nav a[href]" in workshop mode].
    #[arg(short, long, env = "WEB2PDF_SELECTOR")]
    selector: Option<String>,

    /// Extra wait after network idle, in milliseconds.
    #[arg(short, long, env = "WEB2PDF_WAIT", default_value_t = 3000)]
    wait: u64,

    /// Pause between pages, in milliseconds.
    #[arg(short, long, env = "WEB2PDF_DELAY", default_value_t = 2000)]
    delay: u64,

    /// Do not scroll pages before printing.
    #[arg(long, env = "WEB2PDF_NO_SCROLL")]
    no_scroll: bool,

    /// Paper size: A4, Letter, Legal, A3.
    #[arg(long, env = "WEB2PDF_FORMAT", default_value = "A4")]
    format: String,

    /// Landscape orientation.
    #[arg(long, env = "WEB2PDF_LANDSCAPE")]
    landscape: bool,

    /// Page margins, CSS style: "20px", "1cm 2cm", "10mm 5mm 10mm 5mm".
    #[arg(long, env = "WEB2PDF_MARGIN", default_value = "20px")]
    margin: String,

    /// Maximum pages taken from a crawl, seed included (0 = unlimited).
    #[arg(long, env = "WEB2PDF_MAX_PAGES", default_value_t = 50)]
    max_pages: usize,

    /// Attempts per page, including the first (1 = no retries).
    #[arg(long, alias = "retries", env = "WEB2PDF_ATTEMPTS", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..=20))]
    attempts: u32,

    /// Pause before a retry, in milliseconds; base pause for exponential
    /// [default: 2000 fixed, 1000 exponential].
    #[arg(long, env = "WEB2PDF_RETRY_BACKOFF")]
    retry_backoff: Option<u64>,

    /// Retry schedule [default: fixed for --url-file batches, exponential otherwise].
    #[arg(long, env = "WEB2PDF_RETRY_STRATEGY", value_enum)]
    retry_strategy: Option<RetryStrategyArg>,

    /// Navigation timeout per page, in seconds.
    #[arg(long, env = "WEB2PDF_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Do not print the URL header and page-number footer.
    #[arg(long, env = "WEB2PDF_NO_HEADER_FOOTER")]
    no_header_footer: bool,

    /// Do not print CSS backgrounds.
    #[arg(long, env = "WEB2PDF_NO_BACKGROUND")]
    no_background: bool,

    /// Batch runs: also merge all pages into one PDF.
    #[arg(long, env = "WEB2PDF_MERGE")]
    merge: bool,

    /// Chrome/Chromium executable.
    #[arg(long, env = "WEB2PDF_CHROME")]
    chrome: Option<PathBuf>,

    /// Disable Chrome's sandbox (containers running as root).
    #[arg(long, env = "WEB2PDF_NO_SANDBOX")]
    no_sandbox: bool,

    /// Upload the result: an http(s) endpoint accepting PUT, or a file:// directory.
    #[arg(long, env = "WEB2PDF_UPLOAD_URL")]
    upload_url: Option<String>,

    /// Bearer token sent with uploads.
    #[arg(long, env = "WEB2PDF_UPLOAD_TOKEN", hide_env_values = true)]
    upload_token: Option<String>,

    /// Public base URL of uploaded files [default: the upload URL].
    #[arg(long, env = "WEB2PDF_PUBLIC_URL")]
    public_url: Option<String>,

    /// Print the run summary as JSON on stdout.
    #[arg(long, env = "WEB2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "WEB2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "WEB2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "WEB2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Single,
    Multi,
    Workshop,
}

impl From<ModeArg> for ConversionMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Single => ConversionMode::Single,
            ModeArg::Multi => ConversionMode::Multi,
            ModeArg::Workshop => ConversionMode::Workshop,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum RetryStrategyArg {
    Fixed,
    Exponential,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose always wins.
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

    match run(&cli, show_progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {}", red("✘"), bold(&err.to_string()));
            for cause in err.chain().skip(1) {
                eprintln!("  {} {cause}", dim("caused by:"));
            }
            if let Some(hint) = err.downcast_ref::<Web2PdfError>().and_then(Web2PdfError::hint) {
                eprintln!("  {} {}", cyan("hint:"), hint.message());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<()> {
    // ── Step 1: Parse the target and configuration ───────────────────────
    let target = Target::from_args(cli.url.clone(), cli.url_file.clone())?;
    let mode: ConversionMode = cli.mode.into();
    let config = build_config(cli, mode)?;
    let output = OutputOptions {
        path: cli.output.clone(),
        merge: cli.merge,
    };
    let store = build_store(cli)?;

    // ── Step 2: Convert ──────────────────────────────────────────────────
    let result = if show_progress {
        let progress = CliProgressCallback::new();
        let result = convert(&target, mode, &output, &config, &progress).await;
        progress.abandon();
        result
    } else {
        convert(&target, mode, &output, &config, &SilentProgress).await
    };
    let report = result.context("Conversion failed")?;

    // ── Step 3: Publish ──────────────────────────────────────────────────
    let uploaded = match store {
        Some(store) => upload_outputs(store.as_ref(), &report).await?,
        None => Vec::new(),
    };

    // ── Step 4: Report ───────────────────────────────────────────────────
    if cli.json {
        let mut record = serde_json::to_value(report.summary.to_record())
            .context("Failed to serialise summary")?;
        if !uploaded.is_empty() {
            record["uploads"] = serde_json::json!(uploaded);
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&record).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        print_report(&report, show_progress);
        for url in &uploaded {
            eprintln!("   {} {}", cyan("↑"), url);
        }
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, mode: ConversionMode) -> Result<ConversionConfig> {
    let format: PageFormat = cli.format.parse()?;
    let margins = Margins::parse(&cli.margin)?;
    let retry = retry_policy(cli);
    let selector = match (&cli.selector, mode) {
        (Some(s), _) => s.clone(),
        (None, ConversionMode::Workshop) => WORKSHOP_SELECTOR.to_string(),
        (None, _) => "a".to_string(),
    };

    let mut builder = ConversionConfig::builder()
        .page_format(format)
        .landscape(cli.landscape)
        .margins(margins)
        .wait_ms(cli.wait)
        .inter_request_delay_ms(cli.delay)
        .auto_scroll(!cli.no_scroll)
        .print_background(!cli.no_background)
        .display_header_footer(!cli.no_header_footer)
        .navigation_timeout_secs(cli.timeout)
        .retry(retry)
        .selector(selector)
        .max_pages((cli.max_pages > 0).then_some(cli.max_pages));

    if let Some(ref chrome) = cli.chrome {
        builder = builder.chrome_executable(chrome);
    }

    let mut config = builder.build().context("Invalid configuration")?;
    config.browser.sandbox = !cli.no_sandbox;
    Ok(config)
}

/// Batches keep a steady fixed pace; single pages and crawls back off
/// exponentially and give up early on client errors.
fn retry_policy(cli: &Cli) -> RetryPolicy {
    let strategy = cli.retry_strategy.unwrap_or(if cli.url_file.is_some() {
        RetryStrategyArg::Fixed
    } else {
        RetryStrategyArg::Exponential
    });
    match strategy {
        RetryStrategyArg::Fixed => RetryPolicy::fixed(
            cli.attempts,
            cli.retry_backoff.unwrap_or(DEFAULT_RETRY_DELAY_MS),
        ),
        RetryStrategyArg::Exponential => RetryPolicy::exponential(
            cli.attempts,
            cli.retry_backoff.unwrap_or(INTERACTIVE_BASE_DELAY_MS),
            INTERACTIVE_BACKOFF_FACTOR,
        ),
    }
}

/// `file://` uploads go to a directory store; anything else is PUT over HTTP.
fn build_store(cli: &Cli) -> Result<Option<Box<dyn BlobStore>>> {
    let Some(ref raw) = cli.upload_url else {
        return Ok(None);
    };
    let parsed = Url::parse(raw).with_context(|| format!("Invalid --upload-url '{raw}'"))?;
    if parsed.scheme() == "file" {
        let dir = parsed
            .to_file_path()
            .map_err(|_| anyhow::anyhow!("--upload-url '{raw}' is not a local path"))?;
        return Ok(Some(Box::new(DirectoryBlobStore::new(dir))));
    }

    let mut store = HttpBlobStore::new(raw.as_str(), cli.public_url.clone(), cli.timeout)?;
    if let Some(ref token) = cli.upload_token {
        store = store.with_token(token);
    }
    Ok(Some(Box::new(store)))
}

/// Upload the merged/single PDF, or every saved page of an unmerged batch.
async fn upload_outputs(store: &dyn BlobStore, report: &BatchReport) -> Result<Vec<String>> {
    let files: Vec<PathBuf> = if report.output_path.is_file() {
        vec![report.output_path.clone()]
    } else {
        report
            .summary
            .results
            .iter()
            .filter_map(|r| r.saved_as.clone())
            .collect()
    };

    let mut urls = Vec::with_capacity(files.len());
    for path in files {
        urls.push(upload_file(store, &path).await?);
    }
    Ok(urls)
}

async fn upload_file(store: &dyn BlobStore, path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {} for upload", path.display()))?;
    let url = store
        .upload(bytes, &blob_name())
        .await
        .with_context(|| format!("Failed to upload {}", path.display()))?;
    Ok(url)
}

fn print_report(report: &BatchReport, show_progress: bool) {
    let summary = &report.summary;
    if !show_progress {
        eprintln!(
            "Rendered {}/{} pages in {:.1}s",
            summary.successful, summary.total, summary.duration_seconds
        );
        for failure in summary.failures() {
            eprintln!(
                "  {} {}  {}",
                red("✗"),
                failure.url(),
                failure.error_message().unwrap_or_default()
            );
        }
    }

    let pages = report
        .merged_pages
        .map(|n| format!("  {}", dim(&format!("{n} pages"))))
        .unwrap_or_default();
    eprintln!(
        "{}  {}{}",
        if summary.failed == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        bold(&report.output_path.display().to_string()),
        pages,
    );
    for skipped in &report.skipped_inputs {
        eprintln!(
            "   {} page #{} left out of the merge: {}",
            cyan("⚠"),
            skipped.index + 1,
            skipped.reason
        );
    }
    if let Some(ref path) = report.summary_path {
        eprintln!("   {} {}", dim("summary:"), dim(&path.display().to_string()));
    }
}
