//! Azure Document Intelligence REST backend.
//!
//! Analysis is a two-step protocol: the document is submitted with
//! `POST .../documentModels/{model}:analyze`, which answers `202 Accepted`
//! with an `Operation-Location` header. That URL is then polled until the
//! operation reports `succeeded` or `failed`.
//!
//! Polling is unbounded here; callers wrap [`DocumentAnalyzer::submit`] in
//! a timeout.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::analyzer::{AnalyzeResponse, AnalyzedDocument, DocumentAnalyzer, DocumentField};
use super::error::BackendError;
use crate::http_client::{redact_query, HttpClient, HttpResponse};
use crate::models::{ComponentHealth, DocumentSource};

const BACKEND_NAME: &str = "document-intelligence";
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

#[derive(Debug, Clone)]
pub struct DocumentIntelligenceConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    /// Poll interval used when the service sends no Retry-After.
    pub poll_interval: Duration,
}

impl DocumentIntelligenceConfig {
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    fn base(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    pub fn analyze_url(&self, model_id: &str) -> String {
        format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            self.base(),
            model_id,
            self.api_version
        )
    }

    fn info_url(&self) -> String {
        format!(
            "{}/documentintelligence/info?api-version={}",
            self.base(),
            self.api_version
        )
    }
}

pub struct DocumentIntelligenceClient {
    http: HttpClient,
    config: DocumentIntelligenceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequestBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    url_source: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base64_source: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationStatus {
    status: String,
    #[serde(default)]
    analyze_result: Option<WireAnalyzeResult>,
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAnalyzeResult {
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    documents: Vec<WireDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDocument {
    #[serde(default)]
    doc_type: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    fields: HashMap<String, WireField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireField {
    #[serde(default)]
    value_string: Option<String>,
    #[serde(default)]
    value_number: Option<f64>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl WireError {
    fn describe(&self) -> String {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => format!("{}: {}", code, message),
            (None, Some(message)) => message.clone(),
            (Some(code), None) => code.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

impl From<WireAnalyzeResult> for AnalyzeResponse {
    fn from(wire: WireAnalyzeResult) -> Self {
        let documents = wire
            .documents
            .into_iter()
            .map(|doc| AnalyzedDocument {
                doc_type: doc.doc_type,
                confidence: doc.confidence,
                fields: doc
                    .fields
                    .into_iter()
                    .map(|(name, f)| {
                        let value = f
                            .value_string
                            .or_else(|| f.value_number.map(|n| n.to_string()));
                        (
                            name,
                            DocumentField {
                                value,
                                content: f.content,
                                confidence: f.confidence,
                            },
                        )
                    })
                    .collect(),
            })
            .collect();

        AnalyzeResponse {
            api_version: wire.api_version,
            model_id: wire.model_id.unwrap_or_default(),
            documents,
        }
    }
}

impl DocumentIntelligenceClient {
    pub fn new(http: HttpClient, config: DocumentIntelligenceConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &DocumentIntelligenceConfig {
        &self.config
    }

    async fn check(&self, response: HttpResponse) -> Result<HttpResponse, BackendError> {
        if response.is_success() {
            return Ok(response);
        }
        let status = response.status.as_u16();
        let retry_after = response.retry_after();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::from_status(
            BACKEND_NAME,
            status,
            retry_after,
            &body,
        ))
    }

    async fn start(
        &self,
        source: &DocumentSource,
        model_id: &str,
    ) -> Result<(String, Option<Duration>), BackendError> {
        let body = match source {
            DocumentSource::Url(url) => AnalyzeRequestBody {
                url_source: Some(url.as_str()),
                base64_source: None,
            },
            DocumentSource::Bytes { data, .. } => AnalyzeRequestBody {
                url_source: None,
                base64_source: Some(base64::engine::general_purpose::STANDARD.encode(data)),
            },
        };

        let url = self.config.analyze_url(model_id);
        debug!(model_id, source = %source.source_type(), "Submitting document for analysis");

        let response = self
            .http
            .post_json(&url, &body, &[(KEY_HEADER, self.config.api_key.as_str())])
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.http.timeout()))?;
        let response = self.check(response).await?;

        let operation = response
            .header("operation-location")
            .map(str::to_string)
            .ok_or_else(|| {
                BackendError::Malformed("analyze response missing Operation-Location".to_string())
            })?;
        Ok((operation, response.retry_after()))
    }

    async fn poll(
        &self,
        operation_url: &str,
        mut wait: Option<Duration>,
    ) -> Result<AnalyzeResponse, BackendError> {
        loop {
            tokio::time::sleep(wait.unwrap_or(self.config.poll_interval)).await;

            let response = self
                .http
                .get(operation_url, &[(KEY_HEADER, self.config.api_key.as_str())])
                .await
                .map_err(|e| BackendError::from_reqwest(e, self.http.timeout()))?;
            let response = self.check(response).await?;
            wait = response.retry_after();

            let status: OperationStatus = response
                .json()
                .await
                .map_err(|e| BackendError::Malformed(e.to_string()))?;

            match status.status.as_str() {
                "notStarted" | "running" => {
                    debug!(operation = %redact_query(operation_url), "Analysis still running");
                }
                "succeeded" => {
                    let result = status.analyze_result.ok_or_else(|| {
                        BackendError::Malformed("succeeded without analyzeResult".to_string())
                    })?;
                    return Ok(result.into());
                }
                "failed" | "canceled" => {
                    let message = status
                        .error
                        .map(|e| e.describe())
                        .unwrap_or_else(|| format!("operation {}", status.status));
                    return Err(BackendError::AnalysisFailed(message));
                }
                other => {
                    return Err(BackendError::Malformed(format!(
                        "unknown operation status '{}'",
                        other
                    )));
                }
            }
        }
    }
}

#[async_trait]
impl DocumentAnalyzer for DocumentIntelligenceClient {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn submit(
        &self,
        source: &DocumentSource,
        model_id: &str,
    ) -> Result<AnalyzeResponse, BackendError> {
        if !self.config.is_configured() {
            return Err(BackendError::NotConfigured(
                "DOCUMENT_INTELLIGENCE_ENDPOINT and DOCUMENT_INTELLIGENCE_KEY must be set"
                    .to_string(),
            ));
        }
        let (operation, wait) = self.start(source, model_id).await?;
        self.poll(&operation, wait).await
    }

    async fn health(&self) -> ComponentHealth {
        if !self.config.is_configured() {
            return ComponentHealth::unhealthy("endpoint or key not configured");
        }
        match self
            .http
            .get(
                &self.config.info_url(),
                &[(KEY_HEADER, self.config.api_key.as_str())],
            )
            .await
        {
            Ok(response) if response.is_success() => {
                ComponentHealth::healthy().with_detail(self.config.base().to_string())
            }
            Ok(response) => ComponentHealth::unhealthy(format!("HTTP {}", response.status)),
            Err(e) => {
                warn!("Document Intelligence health check failed: {}", e);
                ComponentHealth::unhealthy(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    #[derive(Clone, Default)]
    struct FakeService {
        polls: Arc<AtomicU32>,
        base: Arc<std::sync::Mutex<String>>,
    }

    async fn analyze(State(svc): State<FakeService>, headers: HeaderMap) -> impl IntoResponse {
        if headers.get(KEY_HEADER).map(|v| v.as_bytes()) != Some(b"secret".as_slice()) {
            return (StatusCode::UNAUTHORIZED, HeaderMap::new()).into_response();
        }
        let base = svc.base.lock().unwrap().clone();
        let mut out = HeaderMap::new();
        out.insert(
            "operation-location",
            format!("{}/operations/1", base).parse().unwrap(),
        );
        out.insert("retry-after", "0".parse().unwrap());
        (StatusCode::ACCEPTED, out).into_response()
    }

    async fn operation(State(svc): State<FakeService>) -> impl IntoResponse {
        let n = svc.polls.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            return Json(serde_json::json!({"status": "running"}));
        }
        Json(serde_json::json!({
            "status": "succeeded",
            "analyzeResult": {
                "apiVersion": "2024-11-30",
                "modelId": "serialnumber",
                "documents": [{
                    "docType": "serialnumber",
                    "confidence": 0.95,
                    "fields": {
                        "Serial": {"type": "string", "valueString": "SN-123", "content": "SN-123", "confidence": 0.91}
                    }
                }]
            }
        }))
    }

    async fn spawn_fake() -> (String, FakeService) {
        let svc = FakeService::default();
        let app = Router::new()
            .route(
                "/documentintelligence/documentModels/:model",
                post(analyze),
            )
            .route("/operations/1", get(operation))
            .with_state(svc.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        *svc.base.lock().unwrap() = base.clone();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (base, svc)
    }

    fn client(endpoint: &str, key: &str) -> DocumentIntelligenceClient {
        DocumentIntelligenceClient::new(
            HttpClient::new(Duration::from_secs(5)).unwrap(),
            DocumentIntelligenceConfig {
                endpoint: endpoint.to_string(),
                api_key: key.to_string(),
                api_version: "2024-11-30".to_string(),
                poll_interval: Duration::from_millis(10),
            },
        )
    }

    fn pdf_source() -> DocumentSource {
        DocumentSource::Bytes {
            data: b"%PDF-1.4".to_vec(),
            filename: "scan.pdf".to_string(),
            content_type: "application/pdf".to_string(),
        }
    }

    #[test]
    fn test_analyze_url_layout() {
        let cfg = client("https://res.cognitiveservices.azure.com/", "k").config.clone();
        assert_eq!(
            cfg.analyze_url("serialnumber"),
            "https://res.cognitiveservices.azure.com/documentintelligence/documentModels/serialnumber:analyze?api-version=2024-11-30"
        );
    }

    #[test]
    fn test_wire_result_conversion() {
        let wire: WireAnalyzeResult = serde_json::from_value(serde_json::json!({
            "apiVersion": "2024-11-30",
            "modelId": "m",
            "documents": [{"fields": {"Count": {"valueNumber": 4.0, "confidence": 0.5}}}]
        }))
        .unwrap();
        let response: AnalyzeResponse = wire.into();
        let field = response.field("Count");
        assert_eq!(field.raw_value.as_deref(), Some("4"));
        assert_eq!(field.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_submit_and_poll() {
        let (base, svc) = spawn_fake().await;
        let di = client(&base, "secret");
        let response = di.submit(&pdf_source(), "serialnumber").await.unwrap();
        assert_eq!(response.api_version.as_deref(), Some("2024-11-30"));
        let field = response.field("Serial");
        assert_eq!(field.raw_value.as_deref(), Some("SN-123"));
        assert_eq!(field.confidence, 0.91);
        assert_eq!(svc.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_bad_key_is_auth_error() {
        let (base, _svc) = spawn_fake().await;
        let di = client(&base, "wrong");
        let err = di.submit(&pdf_source(), "serialnumber").await.unwrap_err();
        assert!(matches!(err, BackendError::Auth { status: 401 }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_unconfigured_backend() {
        let di = client("", "");
        let err = di.submit(&pdf_source(), "serialnumber").await.unwrap_err();
        assert!(matches!(err, BackendError::NotConfigured(_)));
        assert_eq!(
            di.health().await.status,
            crate::models::ComponentState::Unhealthy
        );
    }
}
