//! Configuration types for web-to-PDF conversion.
//!
//! All behaviour is controlled through [`ConversionConfig`], built once via
//! [`ConversionConfigBuilder`] and passed by reference into every stage. The
//! render knobs that must stay fixed for a whole batch live in
//! [`RenderSettings`]; retry behaviour lives in
//! [`crate::pipeline::retry::RetryPolicy`].

use crate::error::Web2PdfError;
use crate::pipeline::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ── Canonical constants ──────────────────────────────────────────────────

/// Distance scrolled per auto-scroll tick, in CSS pixels.
pub const SCROLL_STEP_PX: u32 = 100;
/// Delay between auto-scroll ticks.
pub const SCROLL_TICK: Duration = Duration::from_millis(100);
/// Upper bound on auto-scroll ticks for pages that keep growing.
pub const MAX_SCROLL_STEPS: u32 = 1000;
/// Navigation timeout applied to every page load.
pub const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 60;
/// Fixed delay after network idle.
pub const DEFAULT_WAIT_MS: u64 = 3000;
/// Pause between two consecutive pages of a batch.
pub const DEFAULT_INTER_REQUEST_DELAY_MS: u64 = 2000;
/// Default margin on every side.
pub const DEFAULT_MARGIN: &str = "20px";
/// Default cap on pages taken from a crawl.
pub const DEFAULT_MAX_PAGES: usize = 50;
/// Default browser viewport.
pub const DEFAULT_VIEWPORT: (u32, u32) = (1280, 800);
/// Selector used for workshop navigation menus.
pub const WORKSHOP_SELECTOR: &str = "nav a[href]";

/// Complete configuration for a conversion run.
///
/// # Example
/// ```rust
/// use edgequake_web2pdf::{ConversionConfig, PageFormat};
///
/// let config = ConversionConfig::builder()
///     .page_format(PageFormat::Letter)
///     .landscape(true)
///     .wait_ms(1000)
///     .build()
///     .unwrap();
/// assert!(config.render.orientation.is_landscape());
/// ```
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Page-level render settings, identical for every page of a batch.
    pub render: RenderSettings,

    /// Retry budget and backoff per page. Default: 3 attempts, fixed 2 s.
    pub retry: RetryPolicy,

    /// How headless Chrome is launched.
    pub browser: BrowserSettings,

    /// CSS selector for navigation links in crawl mode. Default: `a`.
    pub selector: String,

    /// Which discovered links a crawl is allowed to follow.
    pub scope: CrawlScope,

    /// Maximum number of pages taken from a crawl, seed included.
    /// `None` means unlimited. Default: 50.
    pub max_pages: Option<usize>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            render: RenderSettings::default(),
            retry: RetryPolicy::default(),
            browser: BrowserSettings::default(),
            selector: "a".to_string(),
            scope: CrawlScope::default(),
            max_pages: Some(DEFAULT_MAX_PAGES),
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn page_format(mut self, format: PageFormat) -> Self {
        self.config.render.page_format = format;
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.config.render.orientation = orientation;
        self
    }

    pub fn landscape(self, landscape: bool) -> Self {
        self.orientation(if landscape {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        })
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.config.render.margins = margins;
        self
    }

    pub fn wait_ms(mut self, ms: u64) -> Self {
        self.config.render.wait_ms = ms;
        self
    }

    pub fn inter_request_delay_ms(mut self, ms: u64) -> Self {
        self.config.render.inter_request_delay_ms = ms;
        self
    }

    pub fn auto_scroll(mut self, v: bool) -> Self {
        self.config.render.auto_scroll = v;
        self
    }

    pub fn print_background(mut self, v: bool) -> Self {
        self.config.render.print_background = v;
        self
    }

    pub fn display_header_footer(mut self, v: bool) -> Self {
        self.config.render.display_header_footer = v;
        self
    }

    pub fn header_template(mut self, html: impl Into<String>) -> Self {
        self.config.render.header_template = Some(html.into());
        self
    }

    pub fn footer_template(mut self, html: impl Into<String>) -> Self {
        self.config.render.footer_template = Some(html.into());
        self
    }

    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render.navigation_timeout_secs = secs.max(1);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn browser(mut self, browser: BrowserSettings) -> Self {
        self.config.browser = browser;
        self
    }

    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.browser.executable = Some(path.into());
        self
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.config.selector = selector.into();
        self
    }

    pub fn scope(mut self, scope: CrawlScope) -> Self {
        self.config.scope = scope;
        self
    }

    pub fn max_pages(mut self, max: Option<usize>) -> Self {
        self.config.max_pages = max.map(|n| n.max(1));
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Web2PdfError> {
        let c = &self.config;
        if c.retry.max_attempts == 0 {
            return Err(Web2PdfError::InvalidConfig(
                "max attempts must be ≥ 1".into(),
            ));
        }
        if c.selector.trim().is_empty() {
            return Err(Web2PdfError::InvalidConfig(
                "link selector must not be empty".into(),
            ));
        }
        crate::pipeline::discover::parse_selector(&c.selector)?;

        let (width, height) = c.render.paper_size_inches();
        let m = &c.render.margins;
        if m.left.inches() + m.right.inches() >= width
            || m.top.inches() + m.bottom.inches() >= height
        {
            return Err(Web2PdfError::InvalidConfig(format!(
                "margins {} leave no printable area on {} paper",
                m, c.render.page_format
            )));
        }
        Ok(self.config)
    }
}

// ── Render settings ──────────────────────────────────────────────────────

/// Per-batch render settings. Never mutated while a batch is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Paper size. Default: A4.
    pub page_format: PageFormat,
    /// Default: portrait.
    pub orientation: Orientation,
    /// Page margins. Default: 20px on every side.
    pub margins: Margins,
    /// Extra wait after network idle, for late client-side rendering. Default: 3000.
    pub wait_ms: u64,
    /// Pause between two pages of a batch. Default: 2000.
    pub inter_request_delay_ms: u64,
    /// Scroll to the bottom before printing so lazy content loads. Default: true.
    pub auto_scroll: bool,
    /// Print CSS backgrounds. Default: true.
    pub print_background: bool,
    /// Print the header and footer bands. Default: true.
    pub display_header_footer: bool,
    /// Custom header markup. `None` prints the page URL.
    pub header_template: Option<String>,
    /// Custom footer markup. `None` prints "Page X / N".
    pub footer_template: Option<String>,
    /// Upper bound for navigation plus network idle. Default: 60.
    pub navigation_timeout_secs: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            page_format: PageFormat::default(),
            orientation: Orientation::default(),
            margins: Margins::default(),
            wait_ms: DEFAULT_WAIT_MS,
            inter_request_delay_ms: DEFAULT_INTER_REQUEST_DELAY_MS,
            auto_scroll: true,
            print_background: true,
            display_header_footer: true,
            header_template: None,
            footer_template: None,
            navigation_timeout_secs: DEFAULT_NAVIGATION_TIMEOUT_SECS,
        }
    }
}

impl RenderSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    /// Paper width and height in inches after applying orientation.
    pub fn paper_size_inches(&self) -> (f64, f64) {
        let (w, h) = self.page_format.size_inches();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }
}

/// Browser launch options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Chrome/Chromium executable. `None` lets chromiumoxide auto-detect.
    pub executable: Option<PathBuf>,
    /// Run without a visible window. Default: true.
    pub headless: bool,
    /// Keep Chrome's sandbox. Disable inside containers running as root.
    pub sandbox: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// How long to wait for the browser process to come up. Default: 20.
    pub launch_timeout_secs: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            sandbox: true,
            viewport_width: DEFAULT_VIEWPORT.0,
            viewport_height: DEFAULT_VIEWPORT.1,
            launch_timeout_secs: 20,
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Paper sizes supported by the print stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageFormat {
    #[default]
    A4,
    Letter,
    Legal,
    A3,
}

impl PageFormat {
    /// Portrait width and height in inches.
    pub fn size_inches(self) -> (f64, f64) {
        match self {
            PageFormat::A4 => (8.27, 11.69),
            PageFormat::Letter => (8.5, 11.0),
            PageFormat::Legal => (8.5, 14.0),
            PageFormat::A3 => (11.69, 16.54),
        }
    }
}

impl fmt::Display for PageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageFormat::A4 => "A4",
            PageFormat::Letter => "Letter",
            PageFormat::Legal => "Legal",
            PageFormat::A3 => "A3",
        };
        f.write_str(name)
    }
}

impl FromStr for PageFormat {
    type Err = Web2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(PageFormat::A4),
            "letter" => Ok(PageFormat::Letter),
            "legal" => Ok(PageFormat::Legal),
            "a3" => Ok(PageFormat::A3),
            other => Err(Web2PdfError::InvalidConfig(format!(
                "unknown page format '{other}' (expected A4, Letter, Legal or A3)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn is_landscape(self) -> bool {
        self == Orientation::Landscape
    }
}

/// Which discovered links a crawl may follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlScope {
    /// Any link on the seed's host.
    #[default]
    SameSite,
    /// Same host and the seed's leading two path segments, which keeps
    /// AWS Workshop style crawls inside one workshop.
    Workshop,
}

// ── Margins ──────────────────────────────────────────────────────────────

/// A CSS-like length (`20px`, `1cm`, `10mm`, `0.5in`, `12pt`).
///
/// Keeps the text it was parsed from so summaries and logs show what the
/// user typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Length {
    raw: String,
    inches: f64,
}

impl Length {
    pub fn parse(text: &str) -> Result<Self, Web2PdfError> {
        let raw = text.trim();
        let split = raw
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(raw.len());
        let (number, unit) = raw.split_at(split);
        let value: f64 = number.trim().parse().map_err(|_| {
            Web2PdfError::InvalidConfig(format!("invalid length '{raw}'"))
        })?;
        if !value.is_finite() || value < 0.0 {
            return Err(Web2PdfError::InvalidConfig(format!(
                "length must be a non-negative number, got '{raw}'"
            )));
        }
        let inches = match unit.to_ascii_lowercase().as_str() {
            "" | "px" => value / 96.0,
            "in" => value,
            "cm" => value / 2.54,
            "mm" => value / 25.4,
            "pt" => value / 72.0,
            other => {
                return Err(Web2PdfError::InvalidConfig(format!(
                    "unknown length unit '{other}' in '{raw}' (use px, in, cm, mm or pt)"
                )))
            }
        };
        Ok(Self {
            raw: raw.to_string(),
            inches,
        })
    }

    pub fn inches(&self) -> f64 {
        self.inches
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for Length {
    type Error = Web2PdfError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Length::parse(&value)
    }
}

impl From<Length> for String {
    fn from(value: Length) -> Self {
        value.raw
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: Length,
    pub right: Length,
    pub bottom: Length,
    pub left: Length,
}

impl Margins {
    pub fn uniform(length: Length) -> Self {
        Self {
            top: length.clone(),
            right: length.clone(),
            bottom: length.clone(),
            left: length,
        }
    }

    /// Parse one to four CSS-style values (`"20px"`, `"1cm 2cm"`, ...).
    pub fn parse(text: &str) -> Result<Self, Web2PdfError> {
        let parts = text
            .split_whitespace()
            .map(Length::parse)
            .collect::<Result<Vec<_>, _>>()?;
        match parts.as_slice() {
            [all] => Ok(Self::uniform(all.clone())),
            [v, h] => Ok(Self {
                top: v.clone(),
                right: h.clone(),
                bottom: v.clone(),
                left: h.clone(),
            }),
            [t, h, b] => Ok(Self {
                top: t.clone(),
                right: h.clone(),
                bottom: b.clone(),
                left: h.clone(),
            }),
            [t, r, b, l] => Ok(Self {
                top: t.clone(),
                right: r.clone(),
                bottom: b.clone(),
                left: l.clone(),
            }),
            _ => Err(Web2PdfError::InvalidConfig(format!(
                "margin '{text}' must have one to four values"
            ))),
        }
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(Length {
            raw: DEFAULT_MARGIN.to_string(),
            inches: 20.0 / 96.0,
        })
    }
}

impl fmt::Display for Margins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.top, self.right, self.bottom, self.left)
    }
}
