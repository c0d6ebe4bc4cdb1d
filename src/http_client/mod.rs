//! Thin reqwest wrapper with per-request timing.

mod response;

pub use response::HttpResponse;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use tracing::debug;

pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// HTTP client shared by the analysis backend and the document downloader.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, reqwest::Error> {
        let request = with_headers(self.client.get(url), headers);
        self.send("GET", url, request).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, reqwest::Error> {
        let request = with_headers(self.client.post(url).json(body), headers);
        self.send("POST", url, request).await
    }

    async fn send(
        &self,
        method: &str,
        url: &str,
        request: RequestBuilder,
    ) -> Result<HttpResponse, reqwest::Error> {
        let start = Instant::now();
        let response = request.send().await?;
        let elapsed = start.elapsed();

        let mut response_headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                response_headers.insert(name.as_str().to_ascii_lowercase(), v.to_string());
            }
        }

        debug!(
            method,
            url = %redact_query(url),
            status = response.status().as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "HTTP request completed"
        );

        Ok(HttpResponse {
            status: response.status(),
            headers: response_headers,
            elapsed,
            response,
        })
    }
}

fn with_headers(mut request: RequestBuilder, headers: &[(&str, &str)]) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    request
}

/// Drop query strings before logging; they often carry SAS tokens.
pub fn redact_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
