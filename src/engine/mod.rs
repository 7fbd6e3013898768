//! Browser engine abstraction.
//!
//! ```text
//! RenderEngine ──new_context()──▶ PageContext ──navigate / scroll / print──▶ bytes
//!      │                               │
//!   close() once per run            close() once per page
//! ```
//!
//! The pipeline only talks to these traits. [`chrome::ChromeEngine`] is the
//! production implementation; tests plug in scripted fakes.

pub mod chrome;

use crate::error::RenderError;
use async_trait::async_trait;
use std::time::Duration;

pub use chrome::ChromeEngine;

/// Outcome of a successful navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// URL after redirects.
    pub final_url: String,
    /// HTTP status of the main document, when the engine could read it.
    pub status: Option<u16>,
}

/// Everything the print stage hands to the engine, in engine units.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintOptions {
    /// Portrait paper size in inches; `landscape` rotates it.
    pub paper_width: f64,
    pub paper_height: f64,
    pub landscape: bool,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub print_background: bool,
    pub display_header_footer: bool,
    pub header_template: String,
    pub footer_template: String,
}

/// A running browser that hands out isolated page contexts.
///
/// Shared read-only across a batch; contexts never outlive the engine.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Open a fresh, isolated browsing context (own cookies and storage).
    async fn new_context(&self) -> Result<Box<dyn PageContext>, RenderError>;

    /// Open and immediately close one context to prove the engine works.
    async fn probe(&self) -> Result<(), RenderError> {
        let ctx = self.new_context().await?;
        ctx.close().await;
        Ok(())
    }

    /// Shut the engine down. Called exactly once per run.
    async fn close(self: Box<Self>);
}

/// One isolated page, exclusively owned by the render call that opened it.
#[async_trait]
pub trait PageContext: Send {
    /// Load `url` and wait until the network is idle, bounded by `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Navigation, RenderError>;

    /// Scroll down by `dy` CSS pixels; returns the document's scroll height
    /// as measured before the scroll.
    async fn scroll_by(&mut self, dy: u32) -> Result<u64, RenderError>;

    async fn scroll_to_top(&mut self) -> Result<(), RenderError>;

    /// `document.title`, or `None` when empty or unreadable.
    async fn title(&mut self) -> Option<String>;

    /// Serialised DOM of the loaded page.
    async fn content(&mut self) -> Result<String, RenderError>;

    async fn print_pdf(&mut self, options: &PrintOptions) -> Result<Vec<u8>, RenderError>;

    /// Release the context. Implementations also release on drop.
    async fn close(self: Box<Self>);
}
