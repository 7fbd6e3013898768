//! URL list resolution and validation.
//!
//! A URL list is plain UTF-8 text: one URL per line, blank lines and lines
//! starting with `#` ignored. Validation never fails on its own; the caller
//! decides what to do with the rejects via [`valid_urls`].

use crate::error::Web2PdfError;
use crate::output::WorkItem;
use std::path::Path;
use tracing::{debug, warn};
use url::Url;

/// Validation verdict for one candidate URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlCheck {
    pub url: String,
    pub is_valid: bool,
    pub error: Option<String>,
}

/// Read a URL list from disk.
pub async fn load_from_file(path: &Path) -> Result<Vec<String>, Web2PdfError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| Web2PdfError::UrlFileUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
    let urls = parse_url_list(&text);
    debug!("Read {} URL(s) from {}", urls.len(), path.display());
    Ok(urls)
}

/// Split `text` into candidate URLs, trimming each line.
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Parse `raw` as an absolute `http`/`https` URL.
pub fn check_url(raw: &str) -> Result<Url, Web2PdfError> {
    let invalid = |reason: String| Web2PdfError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    if raw.trim().is_empty() {
        return Err(invalid("empty URL".into()));
    }
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    Ok(url)
}

/// Check every URL; invalid entries are reported, not dropped.
pub fn validate<S: AsRef<str>>(urls: &[S]) -> Vec<UrlCheck> {
    urls.iter()
        .map(|u| {
            let url = u.as_ref().to_string();
            match check_url(&url) {
                Ok(_) => UrlCheck {
                    url,
                    is_valid: true,
                    error: None,
                },
                Err(Web2PdfError::InvalidUrl { reason, .. }) => UrlCheck {
                    url,
                    is_valid: false,
                    error: Some(reason),
                },
                Err(other) => UrlCheck {
                    url,
                    is_valid: false,
                    error: Some(other.to_string()),
                },
            }
        })
        .collect()
}

/// Keep the valid URLs, warning about each reject.
///
/// Fails with [`Web2PdfError::NoValidUrls`] when nothing survives.
pub fn valid_urls<S: AsRef<str>>(urls: &[S]) -> Result<Vec<String>, Web2PdfError> {
    let mut valid = Vec::with_capacity(urls.len());
    let mut invalid = 0;
    for check in validate(urls) {
        if check.is_valid {
            valid.push(check.url);
        } else {
            invalid += 1;
            warn!(
                "Skipping invalid URL '{}': {}",
                check.url,
                check.error.as_deref().unwrap_or("invalid")
            );
        }
    }
    if valid.is_empty() {
        return Err(Web2PdfError::NoValidUrls { invalid });
    }
    Ok(valid)
}

/// Number URLs 0..n in input order.
pub fn work_items(urls: Vec<String>) -> Vec<WorkItem> {
    WorkItem::sequence(urls)
}
