//! Publishing finished PDFs to blob storage.
//!
//! Objects are stored under `pdfs/{name}`; the default name is a random
//! `{uuid}.pdf` so concurrent runs never overwrite each other.

use crate::convert::write_atomic;
use crate::error::Web2PdfError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Key prefix for uploaded documents.
pub const OBJECT_PREFIX: &str = "pdfs";

/// Somewhere a PDF can be published to.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` as `name` and return a URL it can be fetched from.
    async fn upload(&self, bytes: Vec<u8>, name: &str) -> Result<String, Web2PdfError>;
}

/// A fresh `{uuid v4}.pdf` object name.
pub fn blob_name() -> String {
    format!("{}.pdf", Uuid::new_v4())
}

// ── HTTP store ───────────────────────────────────────────────────────────

/// Uploads with `PUT {endpoint}/pdfs/{name}`.
///
/// Works with any store that accepts plain PUTs: a GCS or S3 bucket behind
/// a signed-URL proxy, MinIO, or a WebDAV share.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: reqwest::Client,
    endpoint: String,
    public_base: String,
    token: Option<String>,
}

impl HttpBlobStore {
    /// `public_base` is the prefix of the returned URL; `None` reuses `endpoint`.
    pub fn new(
        endpoint: impl Into<String>,
        public_base: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, Web2PdfError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let public_base = public_base
            .map(|b| b.trim_end_matches('/').to_string())
            .unwrap_or_else(|| endpoint.clone());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Web2PdfError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            public_base,
            token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every upload.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Public URL of an uploaded object.
    pub fn public_url(&self, name: &str) -> String {
        format!("{}/{OBJECT_PREFIX}/{name}", self.public_base)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(&self, bytes: Vec<u8>, name: &str) -> Result<String, Web2PdfError> {
        let url = format!("{}/{OBJECT_PREFIX}/{name}", self.endpoint);
        let failed = |detail: String| Web2PdfError::UploadFailed {
            name: name.to_string(),
            detail,
        };
        info!("Uploading {} ({} bytes)", name, bytes.len());

        let mut request = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .body(bytes);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                failed("upload timed out".to_string())
            } else {
                failed(e.to_string())
            }
        })?;
        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }

        let public = self.public_url(name);
        info!("Uploaded to {public}");
        Ok(public)
    }
}

// ── Directory store ──────────────────────────────────────────────────────

/// Publishes into a local directory (a mounted bucket, a shared drive).
#[derive(Debug, Clone)]
pub struct DirectoryBlobStore {
    root: PathBuf,
}

impl DirectoryBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for DirectoryBlobStore {
    async fn upload(&self, bytes: Vec<u8>, name: &str) -> Result<String, Web2PdfError> {
        let dir = self.root.join(OBJECT_PREFIX);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| Web2PdfError::OutputDirFailed {
                path: dir.clone(),
                source,
            })?;
        let path = dir.join(name);
        write_atomic(&path, &bytes).await?;

        let absolute = tokio::fs::canonicalize(&path).await.unwrap_or(path);
        url::Url::from_file_path(&absolute)
            .map(String::from)
            .map_err(|_| Web2PdfError::Internal(format!("no file URL for {}", absolute.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn blob_names_are_unique_pdfs() {
        let a = blob_name();
        assert!(a.ends_with(".pdf"));
        assert_eq!(a.len(), 36 + 4);
        assert_ne!(a, blob_name());
    }

    #[tokio::test]
    async fn http_store_puts_and_returns_public_url() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/bucket/pdfs/report.pdf"))
            .and(header("content-type", "application/pdf"))
            .and(header("authorization", "Bearer s3cret"))
            .and(body_bytes(b"%PDF-1.7".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpBlobStore::new(
            format!("{}/bucket/", server.uri()),
            Some("https://storage.googleapis.com/bucket".into()),
            5,
        )
        .unwrap()
        .with_token("s3cret");
        let url = store.upload(b"%PDF-1.7".to_vec(), "report.pdf").await.unwrap();
        assert_eq!(url, "https://storage.googleapis.com/bucket/pdfs/report.pdf");
    }

    #[tokio::test]
    async fn http_store_surfaces_rejections() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let store = HttpBlobStore::new(server.uri(), None, 5).unwrap();
        let err = store.upload(b"%PDF".to_vec(), "x.pdf").await.unwrap_err();
        match err {
            Web2PdfError::UploadFailed { name, detail } => {
                assert_eq!(name, "x.pdf");
                assert!(detail.contains("403"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn directory_store_returns_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryBlobStore::new(dir.path());
        let url = store.upload(b"%PDF".to_vec(), "a.pdf").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/pdfs/a.pdf"));
        assert_eq!(std::fs::read(dir.path().join("pdfs/a.pdf")).unwrap(), b"%PDF");
    }
}
