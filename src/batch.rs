//! Sequential batch orchestration.
//!
//! ## Why one page at a time?
//!
//! Browser contexts are memory-heavy and documentation sites throttle
//! aggressive clients. The orchestrator renders strictly in input order,
//! pauses between pages, and never has more than one context open (plus
//! the probe context before the loop).
//!
//! ## Engine Lifetime
//!
//! The orchestrator owns the engine for the whole run and closes it
//! exactly once, whether the loop finishes or the probe fails. If the run
//! future is dropped instead, the engine's drop guard releases it.

use crate::config::{ConversionConfig, RenderSettings};
use crate::convert::write_atomic;
use crate::engine::RenderEngine;
use crate::error::{RenderError, RenderErrorKind, Web2PdfError};
use crate::naming::{file_name_for_page, unique_file_name};
use crate::output::{BatchSummary, RenderedPage, WorkItem};
use crate::pipeline::render::render_page;
use crate::pipeline::retry::RetryPolicy;
use crate::pipeline::summary::SummaryBuilder;
use crate::progress::BatchProgressCallback;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Drives work items through render + retry and aggregates the outcomes.
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    settings: RenderSettings,
    retry: RetryPolicy,
    page_dir: Option<PathBuf>,
    retain_pdf_bytes: bool,
    output_location: String,
}

impl BatchOrchestrator {
    /// `output_location` is recorded in the summary as-is.
    pub fn new(config: &ConversionConfig, output_location: impl Into<String>) -> Self {
        Self {
            settings: config.render.clone(),
            retry: config.retry.clone(),
            page_dir: None,
            retain_pdf_bytes: true,
            output_location: output_location.into(),
        }
    }

    /// Also save every successful page as `<title>.pdf` in `dir`.
    ///
    /// The directory must already exist.
    pub fn with_page_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.page_dir = Some(dir.into());
        self
    }

    /// Whether outcomes saved to the page directory keep their PDF bytes
    /// after `on_item_complete`. Defaults to `true`; merging needs them.
    pub fn retain_pdf_bytes(mut self, retain: bool) -> Self {
        self.retain_pdf_bytes = retain;
        self
    }

    /// Override the retry policy taken from the config.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Render every item in order and build the summary.
    ///
    /// Per-item failures end up in the summary; only an engine that cannot
    /// open any context fails the run.
    pub async fn run(
        &self,
        engine: Box<dyn RenderEngine>,
        items: Vec<WorkItem>,
        progress: &dyn BatchProgressCallback,
    ) -> Result<BatchSummary, Web2PdfError> {
        let started_at = Utc::now();
        let total = items.len();

        if let Err(e) = engine.probe().await {
            engine.close().await;
            return Err(Web2PdfError::ContextUnavailable {
                detail: e.detail,
            });
        }

        info!("Processing {total} URL(s)");
        progress.on_batch_start(total);

        let engine_ref: &dyn RenderEngine = engine.as_ref();
        let delay = Duration::from_millis(self.settings.inter_request_delay_ms);
        let mut results = Vec::with_capacity(total);

        for (i, item) in items.iter().enumerate() {
            let current = i + 1;
            info!(
                "[{current}/{total}] ({}%) {}",
                current * 100 / total,
                item.url
            );
            progress.on_item_start(current, total, &item.url);

            let mut outcome = self
                .retry
                .run(item, move |_| self.attempt(engine_ref, item))
                .await;

            match &outcome.error {
                None => info!("✓ {} ({} attempt(s))", item.url, outcome.attempts),
                Some(e) => warn!("✗ {} after {} attempt(s): {e}", item.url, outcome.attempts),
            }
            progress.on_item_complete(current, total, &item.url, &outcome);
            if !self.retain_pdf_bytes && outcome.saved_as.is_some() {
                outcome.pdf_bytes = None;
            }
            results.push(outcome);

            if current < total && !delay.is_zero() {
                sleep(delay).await;
            }
        }

        engine.close().await;

        let summary = SummaryBuilder::new(self.output_location.clone()).build(started_at, results);
        info!(
            "Batch complete: {}/{} succeeded in {:.1}s",
            summary.successful, summary.total, summary.duration_seconds
        );
        progress.on_batch_complete(&summary);
        Ok(summary)
    }

    /// One attempt: render, then save into the page directory if set.
    async fn attempt(
        &self,
        engine: &dyn RenderEngine,
        item: &WorkItem,
    ) -> Result<RenderedPage, RenderError> {
        let mut page = render_page(engine, &item.url, &self.settings).await?;
        if let Some(dir) = &self.page_dir {
            page.saved_as = Some(save_page(dir, &item.url, &page).await?);
        }
        Ok(page)
    }
}

async fn save_page(dir: &Path, url: &str, page: &RenderedPage) -> Result<PathBuf, RenderError> {
    let io_err = |detail: String| RenderError::new(url, RenderErrorKind::Io, detail);
    let name = file_name_for_page(page.title.as_deref(), url);
    let name = unique_file_name(dir, &name)
        .await
        .map_err(|e| io_err(format!("{}: {e}", dir.display())))?;
    let path = dir.join(name);
    write_atomic(&path, &page.pdf)
        .await
        .map_err(|e| io_err(e.to_string()))?;
    Ok(path)
}
