//! HTTP response wrapper.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::retry::parse_retry_after;

pub struct HttpResponse {
    pub status: StatusCode,
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    /// Time until response headers arrived.
    pub elapsed: Duration,
    pub(crate) response: Response,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|s| s.parse().ok())
    }

    /// Server back-off hint from the Retry-After header.
    pub fn retry_after(&self) -> Option<Duration> {
        parse_retry_after(self.header("retry-after"))
    }

    /// Read the body, stopping once it grows past `max_bytes`.
    /// Returns `Ok(None)` when the limit was exceeded.
    pub async fn bytes_limited(mut self, max_bytes: usize) -> Result<Option<Vec<u8>>, reqwest::Error> {
        if self.content_length().is_some_and(|len| len > max_bytes as u64) {
            return Ok(None);
        }
        let mut body = Vec::new();
        while let Some(chunk) = self.response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() > max_bytes {
                return Ok(None);
            }
        }
        Ok(Some(body))
    }

    pub async fn text(self) -> Result<String, reqwest::Error> {
        self.response.text().await
    }

    pub async fn json<T: DeserializeOwned>(self) -> Result<T, reqwest::Error> {
        self.response.json().await
    }
}
