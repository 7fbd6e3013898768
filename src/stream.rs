//! Streaming conversion API: emit outcomes as pages finish.
//!
//! ## Why stream?
//!
//! A crawl of a large documentation site takes minutes. The stream lets
//! callers write or upload each page as soon as it is rendered instead of
//! waiting for the whole batch.
//!
//! Unlike [`crate::convert::convert`], nothing is written to disk and no
//! summary is built. Outcomes arrive strictly in input order, with the same
//! retry policy and inter-request delay as a batch run. The engine is
//! closed once the last item has been yielded; dropping the stream early
//! releases it through its drop guard.

use crate::config::{ConversionConfig, RenderSettings};
use crate::convert::Target;
use crate::engine::{ChromeEngine, RenderEngine};
use crate::error::Web2PdfError;
use crate::output::{RenderOutcome, WorkItem};
use crate::pipeline::render::render_page;
use crate::pipeline::retry::RetryPolicy;
use futures::stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::sleep;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-page outcomes, in input order.
pub type OutcomeStream = Pin<Box<dyn Stream<Item = RenderOutcome> + Send>>;

struct StreamState {
    engine: Option<Box<dyn RenderEngine>>,
    items: VecDeque<WorkItem>,
    settings: RenderSettings,
    retry: RetryPolicy,
    started: bool,
}

/// Render `items` one after the other, yielding each outcome.
pub fn outcome_stream(
    engine: Box<dyn RenderEngine>,
    items: Vec<WorkItem>,
    config: &ConversionConfig,
) -> OutcomeStream {
    let state = StreamState {
        engine: Some(engine),
        items: items.into(),
        settings: config.render.clone(),
        retry: config.retry.clone(),
        started: false,
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        let Some(item) = st.items.pop_front() else {
            if let Some(engine) = st.engine.take() {
                engine.close().await;
            }
            return None;
        };

        if st.started && st.settings.inter_request_delay_ms > 0 {
            sleep(Duration::from_millis(st.settings.inter_request_delay_ms)).await;
        }
        st.started = true;

        let engine = st.engine.as_deref()?;
        let settings = &st.settings;
        let outcome = st
            .retry
            .run(&item, |_| render_page(engine, &item.url, settings))
            .await;
        Some((outcome, st))
    }))
}

/// Resolve `target`, launch Chrome and stream the outcomes.
///
/// Every URL is rendered as-is; crawling is only done by
/// [`crate::convert::crawl_to_pdf`].
pub async fn convert_stream(
    target: &Target,
    config: &ConversionConfig,
) -> Result<OutcomeStream, Web2PdfError> {
    let urls = target.resolve().await?;
    info!("Streaming {} URL(s)", urls.len());

    let request_timeout = config.render.navigation_timeout() + Duration::from_secs(10);
    let engine = ChromeEngine::launch(&config.browser, request_timeout).await?;
    Ok(outcome_stream(
        Box::new(engine),
        WorkItem::sequence(urls),
        config,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Navigation, PageContext, PrintOptions};
    use crate::error::{RenderError, RenderErrorKind};
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Engine(Arc<AtomicUsize>);
    struct Context;

    #[async_trait]
    impl RenderEngine for Engine {
        async fn new_context(&self) -> Result<Box<dyn PageContext>, RenderError> {
            Ok(Box::new(Context))
        }
        async fn close(self: Box<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl PageContext for Context {
        async fn navigate(&mut self, url: &str, _t: Duration) -> Result<Navigation, RenderError> {
            if url.ends_with("/down") {
                return Err(RenderError::new(url, RenderErrorKind::Navigation, "net::ERR_CONNECTION_REFUSED"));
            }
            Ok(Navigation {
                final_url: url.to_string(),
                status: Some(200),
            })
        }
        async fn scroll_by(&mut self, _dy: u32) -> Result<u64, RenderError> {
            Ok(0)
        }
        async fn scroll_to_top(&mut self) -> Result<(), RenderError> {
            Ok(())
        }
        async fn title(&mut self) -> Option<String> {
            None
        }
        async fn content(&mut self) -> Result<String, RenderError> {
            Ok(String::new())
        }
        async fn print_pdf(&mut self, _o: &PrintOptions) -> Result<Vec<u8>, RenderError> {
            Ok(b"%PDF".to_vec())
        }
        async fn close(self: Box<Self>) {}
    }

    #[tokio::test(start_paused = true)]
    async fn yields_in_order_then_closes_engine() {
        let closed = Arc::new(AtomicUsize::new(0));
        let config = ConversionConfig::builder()
            .wait_ms(0)
            .retry(RetryPolicy::fixed(2, 5))
            .build()
            .unwrap();
        let items = WorkItem::sequence(["https://a.com/1", "https://a.com/down", "https://a.com/3"]);

        let outcomes: Vec<RenderOutcome> =
            outcome_stream(Box::new(Engine(Arc::clone(&closed))), items, &config)
                .collect()
                .await;

        let ordinals: Vec<usize> = outcomes.iter().map(|o| o.work_item.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
        assert!(!outcomes[1].is_success());
        assert_eq!(outcomes[1].attempts, 2);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_input_just_closes() {
        let closed = Arc::new(AtomicUsize::new(0));
        let config = ConversionConfig::default();
        let n = outcome_stream(Box::new(Engine(Arc::clone(&closed))), vec![], &config)
            .count()
            .await;
        assert_eq!(n, 0);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
