//! Output file and directory naming.
//!
//! Per-page PDFs are named after the page title so a batch directory reads
//! like a table of contents. Names are made filesystem-safe on every
//! platform and made unique within their directory.

use chrono::{DateTime, NaiveDate, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::Path;
use url::Url;

/// Longest stem kept from a title, in characters.
pub const MAX_STEM_CHARS: usize = 100;

/// Stem used when a title sanitises to nothing.
const FALLBACK_STEM: &str = "page";

static RESERVED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());

/// Turn a page title into a `.pdf` file name.
///
/// ```rust
/// use edgequake_web2pdf::naming::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("Lab 1: Deploy / Verify"), "Lab_1_Deploy_Verify.pdf");
/// assert_eq!(sanitize_file_name("???"), "page.pdf");
/// ```
pub fn sanitize_file_name(title: &str) -> String {
    let cleaned = RESERVED.replace_all(title, "_");
    let cleaned = WHITESPACE.replace_all(&cleaned, "_");
    let cleaned = UNDERSCORES.replace_all(&cleaned, "_");
    let stem: String = cleaned.trim_matches('_').chars().take(MAX_STEM_CHARS).collect();
    let stem = stem.trim_end_matches('_');
    if stem.is_empty() {
        format!("{FALLBACK_STEM}.pdf")
    } else {
        format!("{stem}.pdf")
    }
}

/// File name for a rendered page: its title, else its host and path.
pub fn file_name_for_page(title: Option<&str>, url: &str) -> String {
    if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
        return sanitize_file_name(title);
    }
    match Url::parse(url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default();
            sanitize_file_name(&format!("{host}{}", parsed.path()).replace('/', "_"))
        }
        Err(_) => sanitize_file_name(url),
    }
}

/// `name` if it is free in `dir`, else `stem_1.pdf`, `stem_2.pdf`, ...
pub async fn unique_file_name(dir: &Path, name: &str) -> std::io::Result<String> {
    if !tokio::fs::try_exists(dir.join(name)).await? {
        return Ok(name.to_string());
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (name, String::new()),
    };
    let mut n = 1u32;
    loop {
        let candidate = format!("{stem}_{n}{ext}");
        if !tokio::fs::try_exists(dir.join(&candidate)).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// `batch_YYYYMMDD_HHMMSS` for a run started at `now`.
pub fn batch_dir_name<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    format!("batch_{}", now.format("%Y%m%d_%H%M%S"))
}

/// `{host with dots as underscores}_complete_{YYYY-MM-DD}.pdf`.
pub fn merged_file_name(url: &Url, date: NaiveDate) -> String {
    let host = url.host_str().unwrap_or("site").replace('.', "_");
    format!("{host}_complete_{}.pdf", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn reserved_characters_and_whitespace_collapse() {
        assert_eq!(sanitize_file_name(r#"a<b>c:"d"|e?f*g\h"#), "a_b_c_d_e_f_g_h.pdf");
        assert_eq!(sanitize_file_name("  Module   2 \t Overview  "), "Module_2_Overview.pdf");
        assert_eq!(sanitize_file_name("__x__"), "x.pdf");
    }

    #[test]
    fn long_titles_are_capped() {
        let name = sanitize_file_name(&"é".repeat(300));
        assert_eq!(name.chars().count(), MAX_STEM_CHARS + 4);
    }

    #[test]
    fn empty_title_falls_back() {
        assert_eq!(sanitize_file_name(""), "page.pdf");
        assert_eq!(sanitize_file_name("///"), "page.pdf");
    }

    #[test]
    fn untitled_pages_use_host_and_path() {
        assert_eq!(
            file_name_for_page(None, "https://docs.example.com/guide/intro"),
            "docs.example.com_guide_intro.pdf"
        );
        assert_eq!(file_name_for_page(Some("  "), "https://a.com/"), "a.com.pdf");
        assert_eq!(file_name_for_page(Some("Intro"), "https://a.com/"), "Intro.pdf");
    }

    #[tokio::test]
    async fn collisions_get_numeric_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unique_file_name(dir.path(), "Intro.pdf").await.unwrap(), "Intro.pdf");
        std::fs::write(dir.path().join("Intro.pdf"), b"x").unwrap();
        assert_eq!(unique_file_name(dir.path(), "Intro.pdf").await.unwrap(), "Intro_1.pdf");
        std::fs::write(dir.path().join("Intro_1.pdf"), b"x").unwrap();
        assert_eq!(unique_file_name(dir.path(), "Intro.pdf").await.unwrap(), "Intro_2.pdf");
    }

    #[test]
    fn batch_and_merged_names() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(batch_dir_name(&at), "batch_20240309_140507");

        let url = Url::parse("https://catalog.workshops.aws/foo").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(merged_file_name(&url, date), "catalog_workshops_aws_complete_2024-03-09.pdf");
    }
}
