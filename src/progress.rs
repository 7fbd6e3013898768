//! Progress reporting for batch runs.
//!
//! The orchestrator takes a [`ProgressCallback`] and calls it synchronously,
//! in input order, at each per-item checkpoint. Callers that prefer
//! message passing use [`progress_channel`], whose [`ProgressStream`] yields
//! the same events in the same order.
//!
//! # Example
//!
//! ```rust
//! use edgequake_web2pdf::{BatchProgressCallback, RenderOutcome};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountFailures(AtomicUsize);
//!
//! impl BatchProgressCallback for CountFailures {
//!     fn on_item_complete(&self, _current: usize, _total: usize, _url: &str, outcome: &RenderOutcome) {
//!         if !outcome.is_success() {
//!             self.0.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//! ```

use crate::output::{BatchSummary, OutcomeStatus, RenderOutcome};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Called by the batch orchestrator as it processes each URL.
///
/// All methods default to no-ops. Calls arrive from a single task, strictly
/// in input order, and the orchestrator does not advance until a call
/// returns.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first item.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before the first attempt at an item.
    ///
    /// # Arguments
    /// * `current`: 1-indexed position
    fn on_item_start(&self, current: usize, total: usize, url: &str) {
        let _ = (current, total, url);
    }

    /// Called after an item finished, whether it succeeded or failed.
    fn on_item_complete(&self, current: usize, total: usize, url: &str, outcome: &RenderOutcome) {
        let _ = (current, total, url, outcome);
    }

    /// Called once after the last item, with the built summary.
    fn on_batch_complete(&self, summary: &BatchSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Shared handle to a progress sink.
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

// ── Channel adapter ──────────────────────────────────────────────────────

/// Owned copy of one progress checkpoint. PDF bytes are not carried.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    BatchStarted {
        total: usize,
    },
    ItemStarted {
        current: usize,
        total: usize,
        url: String,
    },
    ItemCompleted {
        current: usize,
        total: usize,
        url: String,
        status: OutcomeStatus,
        attempts: u32,
        error: Option<String>,
    },
    BatchCompleted {
        total: usize,
        successful: usize,
        failed: usize,
    },
}

/// Ordered stream of [`ProgressEvent`]s.
pub type ProgressStream = UnboundedReceiverStream<ProgressEvent>;

/// Forwards every callback into an unbounded channel.
///
/// Sending never blocks, so the orchestrator keeps its pace; a single
/// sender and an mpsc queue keep events in emission order.
pub struct ChannelProgressCallback {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgressCallback {
    fn send(&self, event: ProgressEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl BatchProgressCallback for ChannelProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.send(ProgressEvent::BatchStarted { total });
    }

    fn on_item_start(&self, current: usize, total: usize, url: &str) {
        self.send(ProgressEvent::ItemStarted {
            current,
            total,
            url: url.to_string(),
        });
    }

    fn on_item_complete(&self, current: usize, total: usize, url: &str, outcome: &RenderOutcome) {
        self.send(ProgressEvent::ItemCompleted {
            current,
            total,
            url: url.to_string(),
            status: outcome.status,
            attempts: outcome.attempts,
            error: outcome.error_message(),
        });
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        self.send(ProgressEvent::BatchCompleted {
            total: summary.total,
            successful: summary.successful,
            failed: summary.failed,
        });
    }
}

/// Create a callback/stream pair. The stream ends once the callback (and
/// every clone of it) has been dropped.
pub fn progress_channel() -> (ProgressCallback, ProgressStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Arc::new(ChannelProgressCallback { tx }),
        UnboundedReceiverStream::new(rx),
    )
}
