//! Headless Chrome engine over the DevTools protocol (chromiumoxide).
//!
//! Each [`ChromeContext`] lives in its own CDP browser context, so cookies,
//! local storage and cache never leak from one page to the next. Both the
//! engine and its contexts release browser resources on drop as well as on
//! explicit `close()`, which covers error paths and cancelled futures.

use super::{Navigation, PageContext, PrintOptions, RenderEngine};
use crate::config::BrowserSettings;
use crate::error::{RenderError, RenderErrorKind, Web2PdfError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, FrameId, PrintToPdfParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::listeners::EventStream;
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reads the main document's HTTP status from the Navigation Timing API.
const NAVIGATION_STATUS_JS: &str =
    "(() => { const e = performance.getEntriesByType('navigation')[0]; return e && e.responseStatus ? e.responseStatus : 0; })()";

/// A launched Chrome process plus the task pumping its CDP connection.
pub struct ChromeEngine {
    browser: Option<Arc<Browser>>,
    handler: Option<JoinHandle<()>>,
}

impl ChromeEngine {
    /// Start Chrome with the given settings.
    ///
    /// `request_timeout` bounds every individual CDP command, including the
    /// navigation request itself.
    pub async fn launch(
        settings: &BrowserSettings,
        request_timeout: Duration,
    ) -> Result<Self, Web2PdfError> {
        info!("Launching headless Chrome");

        let mut builder = BrowserConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height)
            .viewport(Viewport {
                width: settings.viewport_width,
                height: settings.viewport_height,
                ..Viewport::default()
            })
            .request_timeout(request_timeout)
            .launch_timeout(Duration::from_secs(settings.launch_timeout_secs))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--mute-audio")
            .arg("--hide-scrollbars");

        if !settings.headless {
            builder = builder.with_head();
        }
        if !settings.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = settings.executable {
            builder = builder.chrome_executable(path);
        }

        let config = builder
            .build()
            .map_err(|detail| Web2PdfError::EngineLaunch { detail })?;

        let (browser, mut handler) =
            Browser::launch(config)
                .await
                .map_err(|e| Web2PdfError::EngineLaunch {
                    detail: e.to_string(),
                })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {e}");
                }
            }
        });

        info!("Headless Chrome ready");
        Ok(Self {
            browser: Some(Arc::new(browser)),
            handler: Some(handler),
        })
    }

    fn browser(&self) -> Result<&Arc<Browser>, RenderError> {
        self.browser.as_ref().ok_or_else(|| {
            RenderError::new(
                "about:blank",
                RenderErrorKind::ContextUnavailable,
                "browser already closed",
            )
        })
    }
}

#[async_trait]
impl RenderEngine for ChromeEngine {
    async fn new_context(&self) -> Result<Box<dyn PageContext>, RenderError> {
        let browser = Arc::clone(self.browser()?);
        let unavailable =
            |e: &dyn std::fmt::Display| RenderError::new("about:blank", RenderErrorKind::ContextUnavailable, e);

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| unavailable(&e))?
            .result
            .browser_context_id;

        // From here on the guard owns the browser context, so an early
        // return still disposes it.
        let mut guard = ChromeContext {
            page: None,
            context_id: Some(context_id.clone()),
            browser,
            url: String::from("about:blank"),
            runtime: Handle::current(),
        };

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id)
            .build()
            .map_err(|e| unavailable(&e))?;
        let page = guard
            .browser
            .new_page(target)
            .await
            .map_err(|e| unavailable(&e))?;
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(|e| unavailable(&e))?;
        guard.page = Some(page);

        Ok(Box::new(guard))
    }

    async fn close(mut self: Box<Self>) {
        if let Some(handle) = self.browser.take() {
            match Arc::try_unwrap(handle) {
                Ok(mut browser) => {
                    if let Err(e) = browser.close().await {
                        warn!("Failed to close browser: {e}");
                    }
                    if let Err(e) = browser.wait().await {
                        debug!("Failed to reap browser process: {e}");
                    }
                    info!("Browser shutdown complete");
                }
                Err(_) => {
                    // A context cleanup task still holds a handle; dropping
                    // the last one kills the process.
                    warn!("Browser still referenced at shutdown; leaving it to drop");
                }
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

impl Drop for ChromeEngine {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

// ── Page context ─────────────────────────────────────────────────────────

/// One page inside its own CDP browser context.
pub struct ChromeContext {
    page: Option<Page>,
    context_id: Option<BrowserContextId>,
    browser: Arc<Browser>,
    url: String,
    runtime: Handle,
}

impl ChromeContext {
    fn page(&self) -> Result<&Page, RenderError> {
        self.page.as_ref().ok_or_else(|| {
            RenderError::new(
                self.url.as_str(),
                RenderErrorKind::ContextUnavailable,
                "page already closed",
            )
        })
    }

    fn err(&self, kind: RenderErrorKind, detail: impl std::fmt::Display) -> RenderError {
        RenderError::new(self.url.as_str(), kind, detail)
    }
}

#[async_trait]
impl PageContext for ChromeContext {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Navigation, RenderError> {
        self.url = url.to_string();
        let page = self.page()?;
        let main_frame = page
            .mainframe()
            .await
            .map_err(|e| self.err(RenderErrorKind::Navigation, e))?;
        let mut events = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(|e| self.err(RenderErrorKind::Navigation, e))?;

        let load = async {
            page.goto(url).await.map_err(|e| match e {
                CdpError::Timeout => self.err(RenderErrorKind::NavigationTimeout, e),
                other => self.err(RenderErrorKind::Navigation, other),
            })?;
            wait_for_network_idle(&mut events, main_frame.as_ref()).await;
            Ok::<_, RenderError>(())
        };
        match tokio::time::timeout(timeout, load).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(self.err(
                    RenderErrorKind::NavigationTimeout,
                    format!("network not idle after {}s", timeout.as_secs()),
                ))
            }
        }

        let status = match page.evaluate(NAVIGATION_STATUS_JS).await {
            Ok(value) => value.into_value::<u16>().ok().filter(|s| *s > 0),
            Err(e) => {
                debug!("Could not read navigation status for {url}: {e}");
                None
            }
        };
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());
        Ok(Navigation { final_url, status })
    }

    async fn scroll_by(&mut self, dy: u32) -> Result<u64, RenderError> {
        let script = format!(
            "(() => {{ const h = document.body ? document.body.scrollHeight : 0; window.scrollBy(0, {dy}); return h; }})()"
        );
        let value = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| self.err(RenderErrorKind::Script, e))?;
        let height = value
            .into_value::<f64>()
            .map_err(|e| self.err(RenderErrorKind::Script, e))?;
        Ok(height.max(0.0) as u64)
    }

    async fn scroll_to_top(&mut self) -> Result<(), RenderError> {
        self.page()?
            .evaluate("window.scrollTo(0, 0)")
            .await
            .map_err(|e| self.err(RenderErrorKind::Script, e))?;
        Ok(())
    }

    async fn title(&mut self) -> Option<String> {
        let page = self.page.as_ref()?;
        match page.get_title().await {
            Ok(title) => title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) => {
                debug!("Could not read title of {}: {e}", self.url);
                None
            }
        }
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        self.page()?
            .content()
            .await
            .map_err(|e| self.err(RenderErrorKind::Script, e))
    }

    async fn print_pdf(&mut self, o: &PrintOptions) -> Result<Vec<u8>, RenderError> {
        let params = PrintToPdfParams::builder()
            .landscape(o.landscape)
            .display_header_footer(o.display_header_footer)
            .print_background(o.print_background)
            .paper_width(o.paper_width)
            .paper_height(o.paper_height)
            .margin_top(o.margin_top)
            .margin_right(o.margin_right)
            .margin_bottom(o.margin_bottom)
            .margin_left(o.margin_left)
            .header_template(o.header_template.clone())
            .footer_template(o.footer_template.clone())
            .prefer_css_page_size(false)
            .build();

        self.page()?
            .pdf(params)
            .await
            .map_err(|e| self.err(RenderErrorKind::Rasterisation, e))
    }

    async fn close(mut self: Box<Self>) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!("Failed to close page for {}: {e}", self.url);
            }
        }
        if let Some(id) = self.context_id.take() {
            if let Err(e) = self
                .browser
                .execute(DisposeBrowserContextParams::new(id))
                .await
            {
                debug!("Failed to dispose browser context for {}: {e}", self.url);
            }
        }
    }
}

impl Drop for ChromeContext {
    fn drop(&mut self) {
        let page = self.page.take();
        let context_id = self.context_id.take();
        if page.is_none() && context_id.is_none() {
            return;
        }
        let browser = Arc::clone(&self.browser);
        let url = std::mem::take(&mut self.url);
        self.runtime.spawn(async move {
            if let Some(page) = page {
                if let Err(e) = page.close().await {
                    warn!("Drop cleanup failed to close page for {url}: {e}");
                }
            }
            if let Some(id) = context_id {
                let _ = browser.execute(DisposeBrowserContextParams::new(id)).await;
            }
        });
    }
}

/// Wait for the main frame's `networkIdle` lifecycle event of the document
/// committed after subscription.
///
/// Events from the previous document (the initial `about:blank`) carry a
/// different loader id and are ignored. Returns early if the page goes away.
async fn wait_for_network_idle(
    events: &mut EventStream<EventLifecycleEvent>,
    main_frame: Option<&FrameId>,
) {
    let mut loader = None;
    while let Some(event) = events.next().await {
        if main_frame.is_some_and(|frame| *frame != event.frame_id) {
            continue;
        }
        match event.name.as_str() {
            "init" => loader = Some(event.loader_id.clone()),
            "networkIdle" if loader.as_ref() == Some(&event.loader_id) => return,
            _ => {}
        }
    }
}
