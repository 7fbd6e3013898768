//! Top-level conversion entry points.
//!
//! ## Modes
//!
//! | Input                | Mode                 | Output                                   |
//! |----------------------|----------------------|------------------------------------------|
//! | several URLs         | any                  | directory of per-page PDFs + summary     |
//! | one URL              | `single`             | one PDF named after the page title       |
//! | one URL              | `multi` / `workshop` | crawl, merge into one PDF, summary beside |
//!
//! [`convert`] launches headless Chrome and picks the flow. The flows
//! themselves ([`convert_batch`], [`convert_single`], [`crawl_to_pdf`]) take
//! any [`RenderEngine`] and own it for the rest of the run.

use crate::batch::BatchOrchestrator;
use crate::config::{ConversionConfig, CrawlScope};
use crate::engine::{ChromeEngine, RenderEngine};
use crate::error::Web2PdfError;
use crate::naming::{batch_dir_name, file_name_for_page, merged_file_name, unique_file_name};
use crate::output::{BatchSummary, WorkItem};
use crate::pipeline::discover::{crawl_order, discover};
use crate::pipeline::merge::{merge_pdfs, successful_pdfs, SkippedInput};
use crate::pipeline::render::load_html;
use crate::pipeline::source::{self, check_url};
use crate::pipeline::summary::write_summary;
use crate::progress::{BatchProgressCallback, NoopProgressCallback};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Root directory for outputs when no explicit path is given.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// How a single target URL is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionMode {
    /// Render just that page.
    Single,
    /// Crawl its same-site links and merge everything.
    #[default]
    Multi,
    /// Crawl navigation links under the seed's path prefix and merge.
    Workshop,
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConversionMode::Single => "single",
            ConversionMode::Multi => "multi",
            ConversionMode::Workshop => "workshop",
        })
    }
}

impl FromStr for ConversionMode {
    type Err = Web2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(ConversionMode::Single),
            "multi" => Ok(ConversionMode::Multi),
            "workshop" => Ok(ConversionMode::Workshop),
            other => Err(Web2PdfError::InvalidConfig(format!(
                "unknown mode '{other}' (expected single, multi or workshop)"
            ))),
        }
    }
}

/// What to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Url(String),
    UrlFile(PathBuf),
}

impl Target {
    /// Exactly one of `url` and `url_file` must be given.
    pub fn from_args(url: Option<String>, url_file: Option<PathBuf>) -> Result<Self, Web2PdfError> {
        match (url, url_file) {
            (Some(_), Some(_)) => Err(Web2PdfError::ConflictingTargets),
            (Some(url), None) => Ok(Target::Url(url)),
            (None, Some(path)) => Ok(Target::UrlFile(path)),
            (None, None) => Err(Web2PdfError::NoTarget),
        }
    }

    /// The validated URL list. Invalid entries are warned about and dropped.
    pub async fn resolve(&self) -> Result<Vec<String>, Web2PdfError> {
        let candidates = match self {
            Target::Url(url) => vec![url.trim().to_string()],
            Target::UrlFile(path) => {
                info!("Reading URLs from {}", path.display());
                source::load_from_file(path).await?
            }
        };
        source::valid_urls(&candidates)
    }
}

/// Where results go.
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    /// File (single page, crawl) or directory (batch). `None` picks a name
    /// under [`DEFAULT_OUTPUT_DIR`].
    pub path: Option<PathBuf>,
    /// Batch runs only: also merge the per-page PDFs into one file.
    pub merge: bool,
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub summary: BatchSummary,
    /// The merged or single PDF, or the batch directory when not merging.
    pub output_path: PathBuf,
    /// `batch_summary.json`, when one was written.
    pub summary_path: Option<PathBuf>,
    /// Page count of the merged document, when one was written.
    pub merged_pages: Option<usize>,
    /// Per-page PDFs the merge could not read.
    pub skipped_inputs: Vec<SkippedInput>,
}

/// Convert `target` according to `mode`, driving headless Chrome.
///
/// # Errors
/// Only fatal errors are returned: no valid URL, output not writable,
/// Chrome unavailable, crawl seed unreachable, or nothing rendered at all
/// when a single PDF was requested. Partial failures are reported in
/// [`BatchReport::summary`].
pub async fn convert(
    target: &Target,
    mode: ConversionMode,
    output: &OutputOptions,
    config: &ConversionConfig,
    progress: &dyn BatchProgressCallback,
) -> Result<BatchReport, Web2PdfError> {
    // ── Step 1: Resolve URLs ─────────────────────────────────────────────
    let urls = target.resolve().await?;

    // ── Step 2: Launch the browser ───────────────────────────────────────
    // One CDP command may span a whole navigation, so give it the same
    // budget plus a margin for the idle wait.
    let request_timeout = config.render.navigation_timeout() + Duration::from_secs(10);
    let engine: Box<dyn RenderEngine> =
        Box::new(ChromeEngine::launch(&config.browser, request_timeout).await?);

    // ── Step 3: Dispatch ─────────────────────────────────────────────────
    if urls.len() > 1 {
        return convert_batch(engine, urls, output, config, progress).await;
    }
    let url = &urls[0];
    match mode {
        ConversionMode::Single => convert_single(engine, url, output.path.as_deref(), config, progress).await,
        ConversionMode::Multi => crawl_to_pdf(engine, url, output.path.as_deref(), config, progress).await,
        ConversionMode::Workshop => {
            let mut config = config.clone();
            config.scope = CrawlScope::Workshop;
            crawl_to_pdf(engine, url, output.path.as_deref(), &config, progress).await
        }
    }
}

/// Blocking wrapper around [`convert`] without progress reporting.
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    target: &Target,
    mode: ConversionMode,
    output: &OutputOptions,
    config: &ConversionConfig,
) -> Result<BatchReport, Web2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Web2PdfError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(convert(target, mode, output, config, &NoopProgressCallback))
}

/// Render a list of URLs into a directory, one PDF per page, plus
/// `batch_summary.json` and optionally a merged PDF.
pub async fn convert_batch(
    engine: Box<dyn RenderEngine>,
    urls: Vec<String>,
    output: &OutputOptions,
    config: &ConversionConfig,
    progress: &dyn BatchProgressCallback,
) -> Result<BatchReport, Web2PdfError> {
    // ── Step 1: Prepare the batch directory ──────────────────────────────
    let dir = output
        .path
        .clone()
        .unwrap_or_else(|| Path::new(DEFAULT_OUTPUT_DIR).join(batch_dir_name(&Local::now())));
    if let Err(e) = ensure_dir(&dir).await {
        engine.close().await;
        return Err(e);
    }
    info!("Batch output directory: {}", dir.display());
    let first_url = urls.first().and_then(|u| Url::parse(u).ok());

    // ── Step 2: Render every page ────────────────────────────────────────
    let summary = BatchOrchestrator::new(config, dir.display().to_string())
        .with_page_dir(&dir)
        .retain_pdf_bytes(output.merge)
        .run(engine, WorkItem::sequence(urls), progress)
        .await?;

    // ── Step 3: Persist the summary ──────────────────────────────────────
    let summary_path = write_summary(&dir, &summary).await?;

    let mut report = BatchReport {
        summary,
        output_path: dir.clone(),
        summary_path: Some(summary_path),
        merged_pages: None,
        skipped_inputs: Vec::new(),
    };

    // ── Step 4: Optional merge ───────────────────────────────────────────
    if output.merge {
        let name = match &first_url {
            Some(url) => merged_file_name(url, Local::now().date_naive()),
            None => "merged.pdf".to_string(),
        };
        let path = dir.join(name);
        let (pages, skipped) = merge_into(&report.summary, &path).await?;
        report.output_path = path;
        report.merged_pages = Some(pages);
        report.skipped_inputs = skipped;
    }

    Ok(report)
}

/// Render one page to one PDF file.
///
/// Without an explicit path the file is named after the page title and
/// placed under [`DEFAULT_OUTPUT_DIR`] without overwriting anything.
pub async fn convert_single(
    engine: Box<dyn RenderEngine>,
    url: &str,
    output: Option<&Path>,
    config: &ConversionConfig,
    progress: &dyn BatchProgressCallback,
) -> Result<BatchReport, Web2PdfError> {
    check_url(url)?;

    // ── Step 1: Render ───────────────────────────────────────────────────
    let mut summary = BatchOrchestrator::new(config, String::new())
        .run(engine, WorkItem::sequence([url]), progress)
        .await?;

    let outcome = &summary.results[0];
    let Some(pdf) = outcome.pdf_bytes.as_deref() else {
        return Err(all_failed(&summary));
    };

    // ── Step 2: Pick the file name ───────────────────────────────────────
    let path = match output {
        Some(path) => place_output(path),
        None => {
            let dir = Path::new(DEFAULT_OUTPUT_DIR);
            ensure_dir(dir).await?;
            let name = file_name_for_page(outcome.title.as_deref(), url);
            let name = unique_file_name(dir, &name)
                .await
                .map_err(|source| Web2PdfError::OutputDirFailed {
                    path: dir.to_path_buf(),
                    source,
                })?;
            dir.join(name)
        }
    };

    // ── Step 3: Write ────────────────────────────────────────────────────
    if let Some(parent) = non_empty_parent(&path) {
        ensure_dir(parent).await?;
    }
    write_atomic(&path, pdf).await?;
    info!("Saved {}", path.display());

    summary.output_location = path.display().to_string();
    Ok(BatchReport {
        summary,
        output_path: path,
        summary_path: None,
        merged_pages: None,
        skipped_inputs: Vec::new(),
    })
}

/// Crawl the navigation of `seed` and merge every page into one PDF.
///
/// The seed page is rendered first, then the discovered links in document
/// order, capped at [`ConversionConfig::max_pages`].
pub async fn crawl_to_pdf(
    engine: Box<dyn RenderEngine>,
    seed: &str,
    output: Option<&Path>,
    config: &ConversionConfig,
    progress: &dyn BatchProgressCallback,
) -> Result<BatchReport, Web2PdfError> {
    let seed = check_url(seed)?;

    // ── Step 1: Load the seed page ───────────────────────────────────────
    info!("Loading seed page {seed}");
    let html = match load_html(engine.as_ref(), seed.as_str(), &config.render).await {
        Ok(html) => html,
        Err(e) => {
            engine.close().await;
            return Err(Web2PdfError::SeedUnreachable(e));
        }
    };

    // ── Step 2: Discover links ───────────────────────────────────────────
    let links = match discover(&html, &seed, &config.selector, config.scope) {
        Ok(links) => links,
        Err(e) => {
            engine.close().await;
            return Err(e);
        }
    };
    let urls = crawl_order(&seed, &links, config.max_pages);
    info!("Crawl will render {} page(s)", urls.len());

    // ── Step 3: Render every page ────────────────────────────────────────
    let path = match output {
        Some(path) => place_output(path),
        None => Path::new(DEFAULT_OUTPUT_DIR).join(merged_file_name(&seed, Local::now().date_naive())),
    };
    let dir = non_empty_parent(&path).unwrap_or(Path::new("."));
    if let Err(e) = ensure_dir(dir).await {
        engine.close().await;
        return Err(e);
    }

    let summary = BatchOrchestrator::new(config, path.display().to_string())
        .run(engine, WorkItem::sequence(urls), progress)
        .await?;

    // ── Step 4: Persist the summary, then merge ──────────────────────────
    let summary_path = write_summary(dir, &summary).await?;
    let (pages, skipped) = merge_into(&summary, &path).await?;

    Ok(BatchReport {
        summary,
        output_path: path,
        summary_path: Some(summary_path),
        merged_pages: Some(pages),
        skipped_inputs: skipped,
    })
}

/// Write `bytes` to a sibling temp file, then rename over `path`.
///
/// Readers never see a half-written file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Web2PdfError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let failed = |source: std::io::Error| Web2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    tokio::fs::write(&tmp, bytes).await.map_err(failed)?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(failed(e));
    }
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Merge the summary's successful pages into `path`.
async fn merge_into(summary: &BatchSummary, path: &Path) -> Result<(usize, Vec<SkippedInput>), Web2PdfError> {
    let inputs: Vec<Vec<u8>> = successful_pdfs(summary).into_iter().map(<[u8]>::to_vec).collect();
    let report = merge_pdfs(inputs).await?;
    if report.page_count == 0 {
        return Err(all_failed(summary));
    }
    for skip in &report.skipped {
        warn!("Page #{} left out of the merged PDF: {}", skip.index + 1, skip.reason);
    }
    write_atomic(path, &report.bytes).await?;
    info!("Merged PDF saved to {} ({} pages)", path.display(), report.page_count);
    Ok((report.page_count, report.skipped))
}

fn all_failed(summary: &BatchSummary) -> Web2PdfError {
    Web2PdfError::AllPagesFailed {
        total: summary.total,
        first_error: summary
            .failures()
            .next()
            .and_then(|o| o.error_message())
            .unwrap_or_else(|| "no readable PDF produced".to_string()),
    }
}

/// A bare file name goes under [`DEFAULT_OUTPUT_DIR`]; anything with a
/// directory part is used as given.
fn place_output(path: &Path) -> PathBuf {
    if non_empty_parent(path).is_some() {
        path.to_path_buf()
    } else {
        Path::new(DEFAULT_OUTPUT_DIR).join(path)
    }
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

async fn ensure_dir(dir: &Path) -> Result<(), Web2PdfError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| Web2PdfError::OutputDirFailed {
            path: dir.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_requires_exactly_one_source() {
        assert!(matches!(Target::from_args(None, None), Err(Web2PdfError::NoTarget)));
        assert!(matches!(
            Target::from_args(Some("https://a.com".into()), Some("urls.txt".into())),
            Err(Web2PdfError::ConflictingTargets)
        ));
        assert_eq!(
            Target::from_args(None, Some("urls.txt".into())).unwrap(),
            Target::UrlFile("urls.txt".into())
        );
    }

    #[tokio::test]
    async fn single_invalid_url_is_rejected() {
        let err = Target::Url("not-a-url".into()).resolve().await.unwrap_err();
        assert!(matches!(err, Web2PdfError::NoValidUrls { invalid: 1 }));
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Workshop".parse::<ConversionMode>().unwrap(), ConversionMode::Workshop);
        assert_eq!(ConversionMode::default(), ConversionMode::Multi);
        assert!("crawl".parse::<ConversionMode>().is_err());
    }

    #[test]
    fn bare_file_names_go_under_output_dir() {
        assert_eq!(place_output(Path::new("doc.pdf")), Path::new("output/doc.pdf"));
        assert_eq!(place_output(Path::new("pdfs/doc.pdf")), Path::new("pdfs/doc.pdf"));
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        write_atomic(&path, b"%PDF-1.7").await.unwrap();
        write_atomic(&path, b"%PDF-1.5").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.5");
        assert!(!dir.path().join("a.pdf.tmp").exists());
    }

    #[tokio::test]
    async fn atomic_write_reports_the_target_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("a.pdf");
        match write_atomic(&path, b"x").await {
            Err(Web2PdfError::OutputWriteFailed { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected {other:?}"),
        }
    }
}
