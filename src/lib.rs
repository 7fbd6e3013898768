//! # edgequake-web2pdf
//!
//! Convert web pages and whole documentation sites to PDF with headless
//! Chrome.
//!
//! ## Why this crate?
//!
//! "Print to PDF" from a browser works for one page. Workshop guides,
//! product docs and tutorials are spread over dozens of pages, load content
//! lazily while you scroll, and rate-limit clients that hammer them. This
//! crate drives a real browser, scrolls every page to the bottom so lazy
//! content is present, prints it, and either keeps the pages side by side
//! or merges them into one document, with retries and polite pacing.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL / URL file
//!  │
//!  ├─ 1. Source    parse and validate http(s) URLs
//!  ├─ 2. Discover  (crawl modes) seed page → same-site navigation links
//!  ├─ 3. Render    navigate, wait, auto-scroll, Page.printToPDF
//!  ├─ 4. Retry     fixed or exponential backoff per page
//!  ├─ 5. Summary   batch_summary.json with per-page outcomes
//!  └─ 6. Merge     successful pages → one PDF in input order (lopdf)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_web2pdf::{convert, ConversionConfig, ConversionMode, NoopProgressCallback, OutputOptions, Target};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let target = Target::Url("https://docs.example.com/guide/".into());
//!     let report = convert(
//!         &target,
//!         ConversionMode::Multi,
//!         &OutputOptions::default(),
//!         &config,
//!         &NoopProgressCallback,
//!     )
//!     .await?;
//!     println!("{} -> {}", report.summary.successful, report.output_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `web2pdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-web2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## Requirements
//!
//! A Chrome or Chromium install. It is found on `PATH` or through
//! [`BrowserSettings::executable`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod storage;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::BatchOrchestrator;
pub use config::{
    BrowserSettings, ConversionConfig, ConversionConfigBuilder, CrawlScope, Margins, Orientation,
    PageFormat, RenderSettings,
};
pub use convert::{
    convert, convert_batch, convert_single, convert_sync, crawl_to_pdf, BatchReport,
    ConversionMode, OutputOptions, Target,
};
pub use engine::{ChromeEngine, PageContext, RenderEngine};
pub use error::{ErrorHint, RenderError, RenderErrorKind, Web2PdfError};
pub use output::{BatchSummary, OutcomeStatus, RenderOutcome, SummaryRecord, WorkItem};
pub use pipeline::retry::{Backoff, RetryPolicy};
pub use progress::{
    progress_channel, BatchProgressCallback, NoopProgressCallback, ProgressCallback, ProgressEvent,
};
pub use storage::{BlobStore, DirectoryBlobStore, HttpBlobStore};
pub use stream::{convert_stream, outcome_stream, OutcomeStream};
