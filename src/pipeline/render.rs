//! Page rendering: one URL in, one PDF out.
//!
//! Every call opens its own browsing context and closes it before
//! returning, on success and on error alike. If the future is dropped
//! mid-flight the context's own drop guard releases it.

use crate::config::{RenderSettings, MAX_SCROLL_STEPS, SCROLL_STEP_PX, SCROLL_TICK};
use crate::engine::{PageContext, PrintOptions, RenderEngine};
use crate::error::{RenderError, RenderErrorKind};
use crate::output::RenderedPage;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info};

/// Render `url` to PDF bytes in a fresh browsing context.
pub async fn render_page(
    engine: &dyn RenderEngine,
    url: &str,
    settings: &RenderSettings,
) -> Result<RenderedPage, RenderError> {
    let mut ctx = engine.new_context().await.map_err(|e| RenderError { url: url.to_string(), ..e })?;
    let result = render_in_context(ctx.as_mut(), url, settings).await;
    ctx.close().await;
    result
}

/// Load `url` and return its serialised DOM, for link discovery.
pub async fn load_html(
    engine: &dyn RenderEngine,
    url: &str,
    settings: &RenderSettings,
) -> Result<String, RenderError> {
    let mut ctx = engine.new_context().await.map_err(|e| RenderError { url: url.to_string(), ..e })?;
    let result = async {
        load(ctx.as_mut(), url, settings).await?;
        ctx.content().await
    }
    .await;
    ctx.close().await;
    result
}

/// The render sequence against an already-open context.
pub async fn render_in_context(
    ctx: &mut dyn PageContext,
    url: &str,
    settings: &RenderSettings,
) -> Result<RenderedPage, RenderError> {
    let start = Instant::now();
    load(ctx, url, settings).await?;

    if settings.auto_scroll {
        let steps = auto_scroll(ctx).await?;
        debug!("{url}: auto-scrolled {steps} steps");
    }

    let title = ctx.title().await;
    let options = PrintOptions::from_settings(settings, url);
    let pdf = ctx.print_pdf(&options).await?;

    info!(
        "Rendered {} ({} bytes) in {}ms",
        url,
        pdf.len(),
        start.elapsed().as_millis()
    );
    Ok(RenderedPage {
        pdf,
        title,
        saved_as: None,
    })
}

/// Navigate, reject HTTP error pages, then honour the settle delay.
async fn load(
    ctx: &mut dyn PageContext,
    url: &str,
    settings: &RenderSettings,
) -> Result<(), RenderError> {
    let nav = ctx.navigate(url, settings.navigation_timeout()).await?;
    if let Some(status) = nav.status.filter(|s| *s >= 400) {
        return Err(RenderError::new(
            url,
            RenderErrorKind::HttpStatus(status),
            format!("server answered {status} for {}", nav.final_url),
        ));
    }
    if nav.final_url != url {
        debug!("{url} redirected to {}", nav.final_url);
    }
    if settings.wait_ms > 0 {
        sleep(Duration::from_millis(settings.wait_ms)).await;
    }
    Ok(())
}

/// Scroll to the bottom in fixed steps so viewport-triggered lazy content
/// mounts, then return to the top. Returns the number of steps taken.
pub async fn auto_scroll(ctx: &mut dyn PageContext) -> Result<u32, RenderError> {
    let mut scrolled: u64 = 0;
    let mut steps = 0;
    loop {
        let height = ctx.scroll_by(SCROLL_STEP_PX).await?;
        scrolled += u64::from(SCROLL_STEP_PX);
        steps += 1;
        if scrolled >= height || steps >= MAX_SCROLL_STEPS {
            break;
        }
        sleep(SCROLL_TICK).await;
    }
    ctx.scroll_to_top().await?;
    Ok(steps)
}

impl PrintOptions {
    /// Resolve settings into engine units for a page at `url`.
    pub fn from_settings(settings: &RenderSettings, url: &str) -> Self {
        let (paper_width, paper_height) = settings.page_format.size_inches();
        let m = &settings.margins;
        Self {
            paper_width,
            paper_height,
            landscape: settings.orientation.is_landscape(),
            margin_top: m.top.inches(),
            margin_right: m.right.inches(),
            margin_bottom: m.bottom.inches(),
            margin_left: m.left.inches(),
            print_background: settings.print_background,
            display_header_footer: settings.display_header_footer,
            header_template: settings
                .header_template
                .clone()
                .unwrap_or_else(|| default_header(url)),
            footer_template: settings
                .footer_template
                .clone()
                .unwrap_or_else(default_footer),
        }
    }
}

/// Header band showing the source URL.
pub fn default_header(url: &str) -> String {
    format!(
        r#"<div style="width: 100%; font-size: 10px; text-align: center; margin: 0 20px;"><span>{}</span></div>"#,
        escape_html(url)
    )
}

/// Footer band showing "Page X / N"; Chrome fills the two spans.
pub fn default_footer() -> String {
    r#"<div style="width: 100%; font-size: 10px; text-align: center; margin: 0 20px;"><span>Page <span class="pageNumber"></span> / <span class="totalPages"></span></span></div>"#
        .to_string()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
