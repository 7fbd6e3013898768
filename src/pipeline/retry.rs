//! Bounded retries around a single render.
//!
//! ## Retry Strategy
//!
//! Batch runs use a fixed pause between attempts (2 s by default): pages
//! fail mostly on slow servers, and a steady pace keeps load on them low.
//! Interactive runs use exponential backoff (`base * factor^(n-1)`) and
//! stop early on errors that cannot succeed on retry, such as HTTP 404.
//!
//! A policy always produces exactly one [`RenderOutcome`] per work item.

use crate::error::RenderError;
use crate::output::{RenderOutcome, RenderedPage, WorkItem};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Default attempt budget per page.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default pause between attempts for batch runs.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2000;
/// Base pause of the interactive exponential schedule.
pub const INTERACTIVE_BASE_DELAY_MS: u64 = 1000;
/// Growth factor of the interactive exponential schedule.
pub const INTERACTIVE_BACKOFF_FACTOR: u32 = 2;

/// Pause schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Backoff {
    Fixed { delay_ms: u64 },
    Exponential { base_ms: u64, factor: u32 },
}

impl Backoff {
    /// Pause before retry number `retry` (1 = the second attempt).
    pub fn delay_before(&self, retry: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Backoff::Exponential { base_ms, factor } => {
                let exp = retry.saturating_sub(1);
                let mult = u64::from(factor).saturating_pow(exp);
                Duration::from_millis(base_ms.saturating_mul(mult))
            }
        }
    }
}

/// How many times to try a page and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always ≥ 1.
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Give up immediately on errors that retrying cannot fix.
    pub fail_fast: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_MS)
    }
}

impl RetryPolicy {
    /// Fixed pause, every error retried. Used for batch runs.
    pub fn fixed(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Fixed { delay_ms },
            fail_fast: false,
        }
    }

    /// Exponential pause, non-retryable errors end the item at once.
    pub fn exponential(max_attempts: u32, base_ms: u64, factor: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Exponential { base_ms, factor },
            fail_fast: true,
        }
    }

    /// 3 attempts, pausing 1 s then 2 s, failing fast on client errors.
    ///
    /// [`ConversionConfig::default`](crate::ConversionConfig) keeps the fixed
    /// policy; the `web2pdf` binary picks this schedule for single-page and
    /// crawl runs.
    pub fn interactive() -> Self {
        Self::exponential(
            DEFAULT_MAX_ATTEMPTS,
            INTERACTIVE_BASE_DELAY_MS,
            INTERACTIVE_BACKOFF_FACTOR,
        )
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::fixed(1, 0)
    }

    /// Drive `attempt` until it succeeds or the budget is spent.
    ///
    /// `attempt` receives the 1-based attempt number. The returned outcome
    /// records how many attempts were made and, on failure, the last error.
    pub async fn run<F, Fut>(&self, item: &WorkItem, mut attempt: F) -> RenderOutcome
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<RenderedPage, RenderError>>,
    {
        let max = self.max_attempts.max(1);
        let mut n = 1;
        loop {
            match attempt(n).await {
                Ok(page) => {
                    if n > 1 {
                        debug!("{} succeeded on attempt {n}", item.url);
                    }
                    return RenderOutcome::success(item.clone(), page, n);
                }
                Err(err) => {
                    if n >= max || (self.fail_fast && !err.is_retryable()) {
                        return RenderOutcome::failure(item.clone(), err, n);
                    }
                    let delay = self.backoff.delay_before(n);
                    warn!(
                        "Attempt {n}/{max} failed for {}: {}. Retrying in {}ms",
                        item.url,
                        err.kind,
                        delay.as_millis()
                    );
                    sleep(delay).await;
                    n += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn item() -> WorkItem {
        WorkItem::new("https://a.com/", 0)
    }

    fn timeout_err() -> RenderError {
        RenderError::new("https://a.com/", RenderErrorKind::NavigationTimeout, "60s")
    }

    #[test]
    fn default_is_three_fixed_attempts() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.backoff, Backoff::Fixed { delay_ms: 2000 });
        assert!(!p.fail_fast);
    }

    #[test]
    fn exponential_delays_double() {
        let b = Backoff::Exponential {
            base_ms: 1000,
            factor: 2,
        };
        assert_eq!(b.delay_before(1), Duration::from_secs(1));
        assert_eq!(b.delay_before(2), Duration::from_secs(2));
        assert_eq!(b.delay_before(3), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let outcome = RetryPolicy::default()
            .run(&item(), move |_| {
                let c = Arc::clone(&c);
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(timeout_err())
                    } else {
                        Ok(RenderedPage {
                            pdf: b"%PDF".to_vec(),
                            ..RenderedPage::default()
                        })
                    }
                }
            })
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_keeps_last_error() {
        let outcome = RetryPolicy::fixed(3, 10)
            .run(&item(), |n| async move {
                Err::<RenderedPage, _>(RenderError::new(
                    "https://a.com/",
                    RenderErrorKind::Navigation,
                    format!("attempt {n}"),
                ))
            })
            .await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.error_message().as_deref(), Some("navigation failed: attempt 3"));
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_policy_retries_client_errors() {
        let outcome = RetryPolicy::fixed(2, 10)
            .run(&item(), |_| async {
                Err::<RenderedPage, _>(RenderError::new(
                    "https://a.com/",
                    RenderErrorKind::HttpStatus(404),
                    "Not Found",
                ))
            })
            .await;
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exponential_policy_fails_fast_on_404() {
        let outcome = RetryPolicy::interactive()
            .run(&item(), |_| async {
                Err::<RenderedPage, _>(RenderError::new(
                    "https://a.com/",
                    RenderErrorKind::HttpStatus(404),
                    "Not Found",
                ))
            })
            .await;
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.error_kind(), Some(RenderErrorKind::HttpStatus(404)));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_attempts() {
        let start = Instant::now();
        let outcome = RetryPolicy::interactive()
            .run(&item(), |_| async { Err::<RenderedPage, _>(timeout_err()) })
            .await;
        assert_eq!(outcome.attempts, 3);
        // 1 s before the second attempt, 2 s before the third.
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }
}
