//! Fetching URL-sourced documents so they can be kept for review.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::http_client::HttpClient;
use crate::models::request::normalize_content_type;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP {status} fetching document")]
    Status { status: u16 },

    #[error("Network error fetching document: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Document exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, max_bytes: usize) -> Result<FetchedDocument, DownloadError>;
}

/// Fetches documents over HTTP(S).
pub struct HttpFetcher {
    http: HttpClient,
}

impl HttpFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, max_bytes: usize) -> Result<FetchedDocument, DownloadError> {
        let response = self.http.get(url.as_str(), &[]).await?;
        if !response.is_success() {
            return Err(DownloadError::Status {
                status: response.status.as_u16(),
            });
        }
        let content_type = response
            .content_type()
            .map(normalize_content_type)
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");
        let data = response
            .bytes_limited(max_bytes)
            .await?
            .ok_or(DownloadError::TooLarge { limit: max_bytes })?;
        Ok(FetchedDocument { data, content_type })
    }
}

/// Last path segment of a URL, used as the stored filename.
pub fn filename_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .next_back()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_from_url() {
        let url = Url::parse("https://x.test/docs/label.jpg?sig=1").unwrap();
        assert_eq!(filename_from_url(&url).as_deref(), Some("label.jpg"));
        let url = Url::parse("https://x.test/").unwrap();
        assert_eq!(filename_from_url(&url), None);
    }
}
