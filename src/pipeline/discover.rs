//! Navigation link discovery for crawl mode.
//!
//! # Link Rules
//!
//! **Keep:** elements matched by the selector whose `href` resolves to an
//! `http(s)` URL on the seed's host.
//!
//! **Drop:**
//! - empty `href`, fragment-only anchors (`#intro`)
//! - `javascript:`, `mailto:`, `tel:` and `data:` links
//! - links to other hosts
//! - in [`CrawlScope::Workshop`], links outside the seed's path prefix
//! - repeats of an already-seen scheme + host + path
//!
//! The emitted URL keeps its query string and drops the fragment.

use crate::config::CrawlScope;
use crate::error::Web2PdfError;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info};
use url::Url;

/// Title of the synthetic entry returned when nothing matched.
pub const FALLBACK_TITLE: &str = "Main Page";

/// A navigation link found on the seed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    pub url: String,
    pub title: String,
}

/// Compile a user-supplied CSS selector.
pub fn parse_selector(selector: &str) -> Result<Selector, Web2PdfError> {
    Selector::parse(selector.trim()).map_err(|e| Web2PdfError::InvalidSelector {
        selector: selector.to_string(),
        detail: format!("{e:?}"),
    })
}

/// Extract the ordered, de-duplicated navigation links of a loaded page.
///
/// Never returns an empty list: when no link survives the filters, the
/// seed itself comes back as a single [`FALLBACK_TITLE`] entry.
pub fn discover(
    html: &str,
    base_url: &Url,
    selector: &str,
    scope: CrawlScope,
) -> Result<Vec<DiscoveredLink>, Web2PdfError> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let prefix = workshop_prefix(base_url);

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_link(href, base_url) else {
            continue;
        };
        if url.host_str() != base_url.host_str() {
            continue;
        }
        if scope == CrawlScope::Workshop && !within_prefix(&url, &prefix) {
            debug!("Outside workshop scope: {url}");
            continue;
        }
        if !seen.insert(page_key(&url)) {
            continue;
        }

        let text = collapse_whitespace(&element.text().collect::<String>());
        let title = if text.is_empty() {
            url.path().to_string()
        } else {
            text
        };
        links.push(DiscoveredLink {
            url: url.to_string(),
            title,
        });
    }

    if links.is_empty() {
        info!("No navigation links found on {base_url}; using the page itself");
        let mut seed = base_url.clone();
        seed.set_fragment(None);
        return Ok(vec![DiscoveredLink {
            url: seed.to_string(),
            title: FALLBACK_TITLE.to_string(),
        }]);
    }

    info!("Discovered {} navigation link(s) on {base_url}", links.len());
    Ok(links)
}

/// Resolve `href` against `base`, or `None` if the link is not followable.
fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// The pages a crawl renders: the seed first, then the discovered links
/// that are not the seed itself, capped at `max_pages` when set.
pub fn crawl_order(seed: &Url, links: &[DiscoveredLink], max_pages: Option<usize>) -> Vec<String> {
    let mut seed = seed.clone();
    seed.set_fragment(None);
    let mut seen = HashSet::from([page_key(&seed)]);
    let mut urls = vec![seed.to_string()];
    for link in links {
        let Ok(url) = Url::parse(&link.url) else {
            continue;
        };
        if seen.insert(page_key(&url)) {
            urls.push(link.url.clone());
        }
    }
    if let Some(max) = max_pages {
        if urls.len() > max {
            info!("Crawl capped at {max} of {} page(s)", urls.len());
            urls.truncate(max);
        }
    }
    urls
}

/// Identity of a page for de-duplication: scheme + host + path, trailing
/// slash ignored.
pub fn page_key(url: &Url) -> String {
    format!(
        "{}://{}{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.path().trim_end_matches('/')
    )
}

/// The seed's first two path segments, e.g. `/workshops/abc` for
/// `/workshops/abc/en-US/intro`.
fn workshop_prefix(seed: &Url) -> String {
    seed.path().split('/').take(3).collect::<Vec<_>>().join("/")
}

/// Whether `url` lies under `prefix` on a segment boundary: `/workshops/abc`
/// covers `/workshops/abc/intro` but not `/workshops/abcdef/intro`.
fn within_prefix(url: &Url, prefix: &str) -> bool {
    let path = url.path();
    if prefix.ends_with('/') {
        return path.starts_with(prefix);
    }
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://docs.example.com/workshops/abc/en-US/").unwrap()
    }

    #[test]
    fn five_links_plus_duplicates_yield_five() {
        let html = r#"<nav>
            <a href="/workshops/abc/en-US/intro">Intro</a>
            <a href="/workshops/abc/en-US/setup">Setup</a>
            <a href="/workshops/abc/en-US/lab1">Lab 1</a>
            <a href="/workshops/abc/en-US/lab2">Lab 2</a>
            <a href="/workshops/abc/en-US/cleanup">Cleanup</a>
            <a href="/workshops/abc/en-US/intro/">Intro again</a>
            <a href="lab1#step-2">Lab 1, step 2</a>
        </nav>"#;
        let links = discover(html, &base(), "nav a[href]", CrawlScope::SameSite).unwrap();
        assert_eq!(links.len(), 5);
        assert_eq!(links[0].title, "Intro");
        assert_eq!(links[2].url, "https://docs.example.com/workshops/abc/en-US/lab1");
    }

    #[test]
    fn unfollowable_links_are_filtered() {
        let html = r##"<body>
            <a href="javascript:void(0)">JS</a>
            <a href="#top">Top</a>
            <a href="mailto:team@example.com">Mail</a>
            <a href="tel:+123">Call</a>
            <a href="">Empty</a>
            <a>No href</a>
            <a href="https://elsewhere.org/page">Other site</a>
            <a href="/ok">Ok</a>
        </body>"##;
        let links = discover(html, &base(), "a", CrawlScope::SameSite).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://docs.example.com/ok");
    }

    #[test]
    fn query_is_kept_but_ignored_for_dedup() {
        let html = r#"<a href="/page?lang=en">One</a><a href="/page?lang=fr">Two</a>"#;
        let links = discover(html, &base(), "a", CrawlScope::SameSite).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://docs.example.com/page?lang=en");
    }

    #[test]
    fn workshop_scope_stays_under_seed_prefix() {
        let html = r#"<nav>
            <a href="/workshops/abc/fr-FR/intro">Intro FR</a>
            <a href="/workshops/xyz/en-US/intro">Other workshop</a>
            <a href="/blog">Blog</a>
        </nav>"#;
        let links = discover(html, &base(), "nav a[href]", CrawlScope::Workshop).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].title, "Intro FR");

        let all = discover(html, &base(), "nav a[href]", CrawlScope::SameSite).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn workshop_scope_rejects_sibling_slug_sharing_the_prefix() {
        let html = r#"<nav>
            <a href="/workshops/abc/en-US/intro">Intro</a>
            <a href="/workshops/abcdef/en-US/intro">Sibling</a>
            <a href="/workshops/abc">Workshop root</a>
        </nav>"#;
        let links = discover(html, &base(), "nav a[href]", CrawlScope::Workshop).unwrap();
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://docs.example.com/workshops/abc/en-US/intro",
                "https://docs.example.com/workshops/abc",
            ]
        );
    }

    #[test]
    fn title_collapses_whitespace_and_falls_back_to_path() {
        let html = "<a href=\"/a\">\n  Getting\n   started </a><a href=\"/b\"><img src=x></a>";
        let links = discover(html, &base(), "a", CrawlScope::SameSite).unwrap();
        assert_eq!(links[0].title, "Getting started");
        assert_eq!(links[1].title, "/b");
    }

    #[test]
    fn no_links_falls_back_to_seed() {
        let seed = Url::parse("https://a.com/docs#top").unwrap();
        let links = discover("<p>nothing here</p>", &seed, "nav a", CrawlScope::SameSite).unwrap();
        assert_eq!(
            links,
            vec![DiscoveredLink {
                url: "https://a.com/docs".into(),
                title: FALLBACK_TITLE.into(),
            }]
        );
    }

    #[test]
    fn invalid_selector_is_an_input_error() {
        let err = discover("<a href=/x>x</a>", &base(), "nav >>> a[", CrawlScope::SameSite).unwrap_err();
        assert!(matches!(err, Web2PdfError::InvalidSelector { .. }));
    }

    #[test]
    fn crawl_order_puts_seed_first_without_repeats() {
        let seed = base();
        let links = vec![
            DiscoveredLink {
                url: "https://docs.example.com/workshops/abc/en-US".into(),
                title: "Home".into(),
            },
            DiscoveredLink {
                url: "https://docs.example.com/workshops/abc/en-US/lab1".into(),
                title: "Lab 1".into(),
            },
            DiscoveredLink {
                url: "https://docs.example.com/workshops/abc/en-US/lab2".into(),
                title: "Lab 2".into(),
            },
        ];
        let urls = crawl_order(&seed, &links, None);
        assert_eq!(
            urls,
            vec![
                "https://docs.example.com/workshops/abc/en-US/",
                "https://docs.example.com/workshops/abc/en-US/lab1",
                "https://docs.example.com/workshops/abc/en-US/lab2",
            ]
        );
        assert_eq!(crawl_order(&seed, &links, Some(2)).len(), 2);
    }

    #[test]
    fn prefix_uses_leading_two_segments() {
        assert_eq!(workshop_prefix(&base()), "/workshops/abc");
        let root = Url::parse("https://a.com/").unwrap();
        assert_eq!(workshop_prefix(&root), "/");
    }
}
