//! Batch summary aggregation and persistence.

use crate::convert::write_atomic;
use crate::error::Web2PdfError;
use crate::output::{BatchSummary, RenderOutcome};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the JSON sidecar written next to the output.
pub const SUMMARY_FILE_NAME: &str = "batch_summary.json";

/// Aggregates outcomes into a [`BatchSummary`] for one output location.
#[derive(Debug, Clone)]
pub struct SummaryBuilder {
    output_location: String,
}

impl SummaryBuilder {
    pub fn new(output_location: impl Into<String>) -> Self {
        Self {
            output_location: output_location.into(),
        }
    }

    /// Aggregate with the current time as the finish time.
    pub fn build(&self, started_at: DateTime<Utc>, results: Vec<RenderOutcome>) -> BatchSummary {
        self.build_at(started_at, Utc::now(), results)
    }

    /// Pure aggregation: the same inputs always give the same summary.
    pub fn build_at(
        &self,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        results: Vec<RenderOutcome>,
    ) -> BatchSummary {
        let successful = results.iter().filter(|r| r.is_success()).count();
        let elapsed = finished_at.signed_duration_since(started_at);
        BatchSummary {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            duration_seconds: elapsed.num_milliseconds().max(0) as f64 / 1000.0,
            output_location: self.output_location.clone(),
            started_at,
            results,
        }
    }
}

/// Serialise `summary` to `dir/batch_summary.json`.
pub async fn write_summary(dir: &Path, summary: &BatchSummary) -> Result<PathBuf, Web2PdfError> {
    let path = dir.join(SUMMARY_FILE_NAME);
    let json = serde_json::to_vec_pretty(&summary.to_record())
        .map_err(|e| Web2PdfError::Internal(format!("summary serialisation failed: {e}")))?;
    write_atomic(&path, &json).await?;
    info!("Summary saved to {}", path.display());
    Ok(path)
}
