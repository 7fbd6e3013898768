//! Result types shared by the pipeline stages.
//!
//! A [`WorkItem`] goes in, a [`RenderOutcome`] comes out (exactly one per
//! item), and a [`BatchSummary`] aggregates the outcomes of a whole run.
//! [`SummaryRecord`] is the on-disk `batch_summary.json` shape.

use crate::error::{RenderError, RenderErrorKind};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One URL queued for conversion, tagged with its position in the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub url: String,
    /// Zero-based position; fixes merge order.
    pub ordinal: usize,
}

impl WorkItem {
    pub fn new(url: impl Into<String>, ordinal: usize) -> Self {
        Self {
            url: url.into(),
            ordinal,
        }
    }

    /// Number URLs in input order.
    pub fn sequence<I, S>(urls: I) -> Vec<WorkItem>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter()
            .enumerate()
            .map(|(ordinal, url)| WorkItem::new(url, ordinal))
            .collect()
    }
}

/// The PDF produced for one page, before it is wrapped in an outcome.
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    pub pdf: Vec<u8>,
    /// `document.title`, when the page had one.
    pub title: Option<String>,
    /// Set when the page was also written to an artifact directory.
    pub saved_as: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// The recorded result of converting one [`WorkItem`].
///
/// Created once by [`crate::pipeline::retry::RetryPolicy::run`]. The only
/// later change is the batch dropping `pdf_bytes` of pages already saved
/// to disk when no merge follows.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub work_item: WorkItem,
    pub status: OutcomeStatus,
    /// Present on success.
    pub pdf_bytes: Option<Vec<u8>>,
    pub title: Option<String>,
    pub saved_as: Option<PathBuf>,
    /// Present on failure: the last error seen.
    pub error: Option<RenderError>,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    pub completed_at_epoch_ms: i64,
}

impl RenderOutcome {
    pub fn success(work_item: WorkItem, page: RenderedPage, attempts: u32) -> Self {
        Self {
            work_item,
            status: OutcomeStatus::Success,
            pdf_bytes: Some(page.pdf),
            title: page.title,
            saved_as: page.saved_as,
            error: None,
            attempts,
            completed_at_epoch_ms: Utc::now().timestamp_millis(),
        }
    }

    pub fn failure(work_item: WorkItem, error: RenderError, attempts: u32) -> Self {
        Self {
            work_item,
            status: OutcomeStatus::Failed,
            pdf_bytes: None,
            title: None,
            saved_as: None,
            error: Some(error),
            attempts,
            completed_at_epoch_ms: Utc::now().timestamp_millis(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    pub fn url(&self) -> &str {
        &self.work_item.url
    }

    /// The last error's message, for failed outcomes.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| format!("{}: {}", e.kind, e.detail))
    }

    pub fn error_kind(&self) -> Option<RenderErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// File name of the saved per-page PDF, if any.
    pub fn file_name(&self) -> Option<String> {
        self.saved_as
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }
}

/// Aggregate of a finished batch. Derived from the outcome list.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub duration_seconds: f64,
    /// Output directory or merged file the run wrote to.
    pub output_location: String,
    pub started_at: DateTime<Utc>,
    /// Outcomes in input order.
    pub results: Vec<RenderOutcome>,
}

impl BatchSummary {
    pub fn failures(&self) -> impl Iterator<Item = &RenderOutcome> {
        self.results.iter().filter(|r| !r.is_success())
    }

    pub fn to_record(&self) -> SummaryRecord {
        SummaryRecord {
            total: self.total,
            successful: self.successful,
            failed: self.failed,
            duration: self.duration_seconds,
            output_dir: self.output_location.clone(),
            timestamp: self.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            results: self.results.iter().map(OutcomeRecord::from).collect(),
        }
    }
}

// ── On-disk record ───────────────────────────────────────────────────────

/// `batch_summary.json` layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Seconds, fractional.
    pub duration: f64,
    pub output_dir: String,
    /// ISO-8601 start time.
    pub timestamp: String,
    pub results: Vec<OutcomeRecord>,
}

/// One entry of [`SummaryRecord::results`].
///
/// Successful entries carry `fileName` and `attempt` (the attempt that
/// succeeded); failed ones carry `error` and `attempts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    pub url: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_kind: Option<RenderErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub attempts: Option<u32>,
    /// Completion time, epoch milliseconds.
    pub timestamp: i64,
}

impl From<&RenderOutcome> for OutcomeRecord {
    fn from(o: &RenderOutcome) -> Self {
        let success = o.is_success();
        Self {
            url: o.work_item.url.clone(),
            status: o.status,
            file_name: o.file_name(),
            output_path: o.saved_as.as_ref().map(|p| p.display().to_string()),
            title: o.title.clone(),
            error: o.error_message(),
            error_kind: o.error_kind(),
            attempt: success.then_some(o.attempts),
            attempts: (!success).then_some(o.attempts),
            timestamp: o.completed_at_epoch_ms,
        }
    }
}
