//! External analysis gateway.
//!
//! [`AnalysisGateway`] wraps a [`DocumentAnalyzer`] with per-attempt
//! timeouts, transient-error classification and exponential backoff. A call
//! moves from pending to submitted, through zero or more retries, and ends
//! either succeeded or failed.

mod analyzer;
mod document_intelligence;
mod error;

pub use analyzer::{AnalyzeResponse, AnalyzedDocument, DocumentAnalyzer, DocumentField};
pub use document_intelligence::{DocumentIntelligenceClient, DocumentIntelligenceConfig};
pub use error::BackendError;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::models::{AnalysisRequest, ComponentHealth, ErrorInfo, ErrorKind, ExtractedField};
use crate::retry::{Cancellation, RetryPolicy, RetryState};

/// Successful gateway call.
#[derive(Debug, Clone)]
pub struct GatewayOutcome {
    pub field: ExtractedField,
    pub api_version: Option<String>,
    pub model_id: String,
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Failed gateway call, with the work spent before giving up.
#[derive(Debug, Clone)]
pub struct GatewayFailure {
    pub error: ErrorInfo,
    /// Submits that actually reached the analyzer.
    pub attempts: u32,
    pub duration_ms: u64,
}

impl GatewayFailure {
    fn new(error: ErrorInfo, attempts: u32, started: Instant) -> Self {
        Self {
            error,
            attempts,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

impl From<ErrorInfo> for GatewayFailure {
    fn from(error: ErrorInfo) -> Self {
        Self {
            error,
            attempts: 0,
            duration_ms: 0,
        }
    }
}

pub struct AnalysisGateway {
    analyzer: Arc<dyn DocumentAnalyzer>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    field_name: String,
}

impl AnalysisGateway {
    pub fn new(
        analyzer: Arc<dyn DocumentAnalyzer>,
        policy: RetryPolicy,
        attempt_timeout: Duration,
        field_name: impl Into<String>,
    ) -> Self {
        Self {
            analyzer,
            policy,
            attempt_timeout,
            field_name: field_name.into(),
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub async fn health(&self) -> ComponentHealth {
        self.analyzer.health().await
    }

    /// Analyze the request's document, retrying transient failures.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
        cancel: &Cancellation,
    ) -> Result<GatewayOutcome, GatewayFailure> {
        let started = Instant::now();
        let mut state: RetryState<BackendError> = RetryState::new(&self.policy);

        while state.begin_attempt() {
            if cancel.is_cancelled() {
                info!(attempt = state.attempt, "Analysis cancelled, not submitting");
                return Err(GatewayFailure::new(cancelled(), state.attempt - 1, started));
            }

            let attempt_started = Instant::now();
            let result = match tokio::time::timeout(
                self.attempt_timeout,
                self.analyzer.submit(request.source(), request.model_id()),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout(self.attempt_timeout)),
            };
            let attempt_ms = attempt_started.elapsed().as_millis() as u64;

            match result {
                Ok(response) => {
                    let field = response.field(&self.field_name);
                    info!(
                        backend = self.analyzer.name(),
                        attempt = state.attempt,
                        attempt_ms,
                        found = field.raw_value.is_some(),
                        confidence = field.confidence,
                        "Analysis succeeded"
                    );
                    return Ok(GatewayOutcome {
                        field,
                        api_version: response.api_version,
                        model_id: request.model_id().to_string(),
                        attempts: state.attempt,
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                }
                Err(err) if err.is_transient() => {
                    warn!(
                        backend = self.analyzer.name(),
                        attempt = state.attempt,
                        max_attempts = state.max_attempts,
                        attempt_ms,
                        "Transient analysis failure: {}",
                        err
                    );
                    let hint = err.retry_after();
                    state.record_failure(err);

                    if !state.has_attempts_left() {
                        break;
                    }
                    if cancel.is_cancelled() {
                        info!(attempt = state.attempt, "Analysis cancelled, not retrying");
                        return Err(GatewayFailure::new(cancelled(), state.attempt, started));
                    }
                    let delay = self.policy.delay_with_hint(state.attempt, hint);
                    debug!(attempt = state.attempt, ?delay, "Backing off before retry");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    error!(
                        backend = self.analyzer.name(),
                        attempt = state.attempt,
                        "Non-retryable analysis failure: {}",
                        err
                    );
                    return Err(GatewayFailure::new(
                        self.permanent_error(err),
                        state.attempt,
                        started,
                    ));
                }
            }
        }

        Err(GatewayFailure::new(
            self.exhausted_error(&state),
            state.attempt,
            started,
        ))
    }

    fn exhausted_error(&self, state: &RetryState<BackendError>) -> ErrorInfo {
        let timed_out = state.last_error.as_ref().is_some_and(BackendError::is_timeout);
        let details = state
            .last_error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default();
        let (kind, message) = if timed_out {
            (
                ErrorKind::AnalysisTimeout,
                format!("Document analysis timed out after {} attempts", state.attempt),
            )
        } else {
            (
                ErrorKind::ServiceUnavailable,
                format!(
                    "Document analysis service unavailable after {} attempts",
                    state.attempt
                ),
            )
        };
        ErrorInfo::new(kind, message)
            .with_details(details)
            .with_retry_after(self.policy.retry_after_secs())
            .with_action("Retry the request later")
    }

    fn permanent_error(&self, err: BackendError) -> ErrorInfo {
        match err {
            BackendError::Rejected { status: 415, message } => {
                ErrorInfo::unsupported_file_type("Document format rejected by analysis service")
                    .with_details(message)
            }
            BackendError::Rejected { status, message } if status == 400 || status == 404 => {
                ErrorInfo::invalid_request("Document rejected by analysis service")
                    .with_details(message)
            }
            BackendError::NotConfigured(details) => ErrorInfo::new(
                ErrorKind::ServiceUnavailable,
                "Document analysis service is not configured",
            )
            .with_details(details),
            other => ErrorInfo::new(ErrorKind::AnalysisFailed, "Document analysis failed")
                .with_details(other.to_string()),
        }
    }
}

fn cancelled() -> ErrorInfo {
    ErrorInfo::new(
        ErrorKind::ServiceUnavailable,
        "Request cancelled before analysis completed",
    )
}
