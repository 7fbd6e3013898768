//! Error types for the edgequake-web2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Web2PdfError`]: **Fatal**: the run cannot proceed at all (no valid
//!   URLs, unreadable URL file, Chrome failed to start). Returned as
//!   `Err(Web2PdfError)` from the top-level `convert*` functions.
//!
//! * [`RenderError`]: **Non-fatal**: a single page failed to navigate or
//!   print. It is retried by [`crate::pipeline::retry::RetryPolicy`] and, if
//!   the budget runs out, stored inside [`crate::output::RenderOutcome`] so
//!   the rest of the batch keeps going.
//!
//! Remediation hints are selected structurally through [`ErrorHint`]; no
//! caller ever needs to inspect message text.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-web2pdf library.
#[derive(Debug, Error)]
pub enum Web2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Neither a single URL nor a URL file was given.
    #[error("No target specified.\nPass a URL with --url or a list of URLs with --url-file.")]
    NoTarget,

    /// Both a single URL and a URL file were given.
    #[error("--url and --url-file are mutually exclusive; pass only one")]
    ConflictingTargets,

    /// Every candidate URL failed validation.
    #[error("No valid URLs to convert ({invalid} rejected).\nURLs must be absolute http:// or https:// addresses.")]
    NoValidUrls { invalid: usize },

    /// The seed or a single target URL is not an absolute http(s) URL.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The navigation-link selector is not valid CSS.
    #[error("Invalid CSS selector '{selector}': {detail}")]
    InvalidSelector { selector: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The URL list file could not be read.
    #[error("Cannot read URL file '{path}': {source}")]
    UrlFileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The output directory could not be created.
    #[error("Cannot create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// Chrome could not be started.
    #[error("Failed to launch headless Chrome: {detail}\nInstall Chrome/Chromium or point --chrome at the executable.")]
    EngineLaunch { detail: String },

    /// The browser started but refused to open a page context.
    #[error("Browser is running but no page context could be opened: {detail}")]
    ContextUnavailable { detail: String },

    /// The crawl seed page could not be loaded, so no links can be discovered.
    #[error("Seed page could not be loaded: {0}")]
    SeedUnreachable(RenderError),

    /// Every page failed, so there is nothing to merge into the output file.
    #[error("All {total} pages failed; no PDF was produced.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// Upload to the blob store failed.
    #[error("Upload of '{name}' failed: {detail}")]
    UploadFailed { name: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Web2PdfError {
    /// The remediation hint that applies to this error, if any.
    pub fn hint(&self) -> Option<ErrorHint> {
        match self {
            Web2PdfError::NoValidUrls { .. } | Web2PdfError::InvalidUrl { .. } => {
                Some(ErrorHint::InvalidUrl)
            }
            Web2PdfError::UrlFileUnreadable { source, .. }
            | Web2PdfError::OutputDirFailed { source, .. }
            | Web2PdfError::OutputWriteFailed { source, .. } => ErrorHint::for_io(source),
            Web2PdfError::EngineLaunch { .. } | Web2PdfError::ContextUnavailable { .. } => {
                Some(ErrorHint::EngineUnavailable)
            }
            Web2PdfError::SeedUnreachable(e) => e.kind.hint(),
            _ => None,
        }
    }
}

/// A structural classification used to pick a user-facing remediation hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorHint {
    MissingFile,
    PermissionDenied,
    Timeout,
    InvalidUrl,
    EngineUnavailable,
}

impl ErrorHint {
    /// Map an I/O error kind to a hint.
    pub fn for_io(err: &io::Error) -> Option<Self> {
        match err.kind() {
            io::ErrorKind::NotFound => Some(ErrorHint::MissingFile),
            io::ErrorKind::PermissionDenied => Some(ErrorHint::PermissionDenied),
            io::ErrorKind::TimedOut => Some(ErrorHint::Timeout),
            _ => None,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorHint::MissingFile => "Check that the file path exists and is spelled correctly.",
            ErrorHint::PermissionDenied => {
                "Check read/write permissions on the file or output directory."
            }
            ErrorHint::Timeout => {
                "The site took too long to respond. Raise --timeout or --wait, or retry later."
            }
            ErrorHint::InvalidUrl => "Use absolute URLs such as https://example.com/page.",
            ErrorHint::EngineUnavailable => {
                "Make sure Chrome or Chromium is installed, or set --chrome / WEB2PDF_CHROME to its path."
            }
        }
    }
}

impl fmt::Display for ErrorHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// What went wrong while rendering a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "status", rename_all = "snake_case")]
pub enum RenderErrorKind {
    /// Navigation or network idle did not finish within the timeout.
    NavigationTimeout,
    /// The browser reported a navigation failure (DNS, TLS, connection reset).
    Navigation,
    /// The main document answered with an HTTP error status.
    HttpStatus(u16),
    /// Evaluating a script in the page (scrolling, title) failed.
    Script,
    /// `Page.printToPDF` failed.
    Rasterisation,
    /// No browsing context could be opened for this page.
    ContextUnavailable,
    /// The rendered PDF could not be written to disk.
    Io,
}

impl RenderErrorKind {
    /// Whether retrying could plausibly change the result.
    ///
    /// Client errors (4xx) are permanent except 408 Request Timeout and
    /// 429 Too Many Requests.
    pub fn is_retryable(self) -> bool {
        match self {
            RenderErrorKind::HttpStatus(status) => {
                !(400..500).contains(&status) || status == 408 || status == 429
            }
            _ => true,
        }
    }

    /// `Io` carries no `io::ErrorKind`, so it gets no hint.
    pub fn hint(self) -> Option<ErrorHint> {
        match self {
            RenderErrorKind::NavigationTimeout => Some(ErrorHint::Timeout),
            RenderErrorKind::ContextUnavailable => Some(ErrorHint::EngineUnavailable),
            _ => None,
        }
    }
}

impl fmt::Display for RenderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderErrorKind::NavigationTimeout => f.write_str("navigation timed out"),
            RenderErrorKind::Navigation => f.write_str("navigation failed"),
            RenderErrorKind::HttpStatus(status) => write!(f, "HTTP {status}"),
            RenderErrorKind::Script => f.write_str("page script failed"),
            RenderErrorKind::Rasterisation => f.write_str("PDF rendering failed"),
            RenderErrorKind::ContextUnavailable => f.write_str("no browsing context"),
            RenderErrorKind::Io => f.write_str("write failed"),
        }
    }
}

/// A non-fatal error for a single page.
///
/// Carries the URL and a typed [`RenderErrorKind`] so callers can branch on
/// the category without parsing `detail`.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{url}: {kind}: {detail}")]
pub struct RenderError {
    pub url: String,
    pub kind: RenderErrorKind,
    pub detail: String,
}

impl RenderError {
    pub fn new(url: impl Into<String>, kind: RenderErrorKind, detail: impl fmt::Display) -> Self {
        Self {
            url: url.into(),
            kind,
            detail: detail.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
