//! End-to-end tests for edgequake-web2pdf against a real headless Chrome.
//!
//! Pages are served by a local wiremock server, so no internet access is
//! needed, only a Chrome/Chromium install. The suite is gated behind the
//! `E2E_ENABLED` environment variable so it does not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! Point at a specific browser with `WEB2PDF_CHROME=/path/to/chrome`.

use edgequake_web2pdf::{
    convert, ConversionConfig, ConversionMode, NoopProgressCallback, OutputOptions, PageFormat,
    RetryPolicy, Target, Web2PdfError,
};
use lopdf::Document;
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

fn config() -> ConversionConfig {
    let mut builder = ConversionConfig::builder()
        .wait_ms(200)
        .inter_request_delay_ms(100)
        .navigation_timeout_secs(30)
        .retry(RetryPolicy::fixed(2, 500));
    if let Ok(chrome) = std::env::var("WEB2PDF_CHROME") {
        builder = builder.chrome_executable(chrome);
    }
    let mut config = builder.build().expect("valid config");
    // CI containers usually run as root.
    config.browser.sandbox = std::env::var("E2E_CHROME_SANDBOX").is_ok();
    config
}

fn html(title: &str, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<!doctype html><html><head><title>{title}</title></head><body>{body}</body></html>"),
        "text/html; charset=utf-8",
    )
}

/// A small documentation site: index with a nav menu and three chapters.
async fn docs_site() -> MockServer {
    let server = MockServer::start().await;
    let nav = r#"<nav>
        <a href="/docs/intro">Introduction</a>
        <a href="/docs/setup">Setup</a>
        <a href="/docs/usage">Usage</a>
        <a href="/docs/intro#again">Introduction (again)</a>
    </nav><h1>Docs home</h1>"#;
    Mock::given(method("GET"))
        .and(path("/docs/"))
        .respond_with(html("Docs Home", nav))
        .mount(&server)
        .await;
    for (slug, title) in [("intro", "Introduction"), ("setup", "Setup"), ("usage", "Usage")] {
        let tall = format!("<h1>{title}</h1>{}", "<p>Lorem ipsum dolor sit amet.</p>".repeat(200));
        Mock::given(method("GET"))
            .and(path(format!("/docs/{slug}")))
            .respond_with(html(title, &tall))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/docs/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;
    server
}

fn page_count(path: &Path) -> usize {
    Document::load(path)
        .unwrap_or_else(|e| panic!("{} is not a readable PDF: {e}", path.display()))
        .get_pages()
        .len()
}

// ── Single page ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_single_page_to_file() {
    e2e_skip_unless_ready!();
    let server = docs_site().await;
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("intro.pdf");

    let report = convert(
        &Target::Url(format!("{}/docs/intro", server.uri())),
        ConversionMode::Single,
        &OutputOptions {
            path: Some(out.clone()),
            merge: false,
        },
        &config(),
        &NoopProgressCallback,
    )
    .await
    .expect("single page should render");

    assert_eq!(report.output_path, out);
    assert_eq!(report.summary.results[0].title.as_deref(), Some("Introduction"));
    let bytes = std::fs::read(&out).unwrap();
    assert!(bytes.starts_with(b"%PDF"), "output is not a PDF");
    // 200 paragraphs do not fit on one A4 page
    assert!(page_count(&out) > 1);
    println!("single: {} pages, {} bytes", page_count(&out), bytes.len());
}

#[tokio::test]
async fn test_landscape_letter_changes_paper_size() {
    e2e_skip_unless_ready!();
    let server = docs_site().await;
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("wide.pdf");
    let mut config = config();
    config.render.page_format = PageFormat::Letter;
    config.render.orientation = edgequake_web2pdf::Orientation::Landscape;

    convert(
        &Target::Url(format!("{}/docs/setup", server.uri())),
        ConversionMode::Single,
        &OutputOptions {
            path: Some(out.clone()),
            merge: false,
        },
        &config,
        &NoopProgressCallback,
    )
    .await
    .unwrap();

    let doc = Document::load(&out).unwrap();
    let first = *doc.get_pages().values().next().unwrap();
    let media_box = doc
        .get_object(first)
        .unwrap()
        .as_dict()
        .unwrap()
        .get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .clone();
    let width = media_box[2].as_float().unwrap();
    let height = media_box[3].as_float().unwrap();
    // 11in x 8.5in at 72pt/in
    assert!((width - 792.0).abs() < 2.0, "width {width}");
    assert!((height - 612.0).abs() < 2.0, "height {height}");
}

#[tokio::test]
async fn test_single_page_404_is_fatal() {
    e2e_skip_unless_ready!();
    let server = docs_site().await;
    let dir = tempfile::tempdir().unwrap();

    let err = convert(
        &Target::Url(format!("{}/docs/missing", server.uri())),
        ConversionMode::Single,
        &OutputOptions {
            path: Some(dir.path().join("missing.pdf")),
            merge: false,
        },
        &config(),
        &NoopProgressCallback,
    )
    .await
    .unwrap_err();

    match err {
        Web2PdfError::AllPagesFailed { first_error, .. } => {
            assert!(first_error.contains("404"), "got: {first_error}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ── Crawl ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_crawl_merges_seed_and_chapters() {
    e2e_skip_unless_ready!();
    let server = docs_site().await;
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("docs.pdf");

    let report = convert(
        &Target::Url(format!("{}/docs/", server.uri())),
        ConversionMode::Multi,
        &OutputOptions {
            path: Some(out.clone()),
            merge: false,
        },
        &config(),
        &NoopProgressCallback,
    )
    .await
    .expect("crawl should succeed");

    // seed + 3 distinct chapters
    assert_eq!(report.summary.total, 4);
    assert_eq!(report.summary.successful, 4);
    assert_eq!(report.merged_pages, Some(page_count(&out)));
    let urls: Vec<&str> = report.summary.results.iter().map(|r| r.url()).collect();
    assert!(urls[0].ends_with("/docs/"));
    assert!(urls[1].ends_with("/docs/intro"));
    assert!(urls[3].ends_with("/docs/usage"));
    assert!(report.summary_path.unwrap().is_file());
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_url_file_batch_with_one_failure() {
    e2e_skip_unless_ready!();
    let server = docs_site().await;
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("urls.txt");
    std::fs::write(
        &list,
        format!(
            "# chapters\n{0}/docs/intro\n\n{0}/docs/missing\nnot a url\n{0}/docs/usage\n",
            server.uri()
        ),
    )
    .unwrap();
    let out_dir = dir.path().join("batch");

    let report = convert(
        &Target::UrlFile(list),
        ConversionMode::Multi,
        &OutputOptions {
            path: Some(out_dir.clone()),
            merge: true,
        },
        &config(),
        &NoopProgressCallback,
    )
    .await
    .expect("batch should succeed with partial failures");

    assert_eq!(report.summary.total, 3);
    assert_eq!((report.summary.successful, report.summary.failed), (2, 1));
    assert!(out_dir.join("Introduction.pdf").is_file());
    assert!(out_dir.join("Usage.pdf").is_file());
    assert!(out_dir.join("batch_summary.json").is_file());
    assert_eq!(
        report.merged_pages,
        Some(page_count(&out_dir.join("Introduction.pdf")) + page_count(&out_dir.join("Usage.pdf")))
    );
}
