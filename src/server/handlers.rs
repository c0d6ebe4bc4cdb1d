//! HTTP request handlers.

use std::future::Future;

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection, Multipart, Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::{debug, warn};

use super::AppState;
use crate::models::{AnalysisResult, ErrorInfo, ErrorKind, FileAnalysisParams, UrlAnalysisParams};
use crate::retry::Cancellation;
use crate::storage::StorageError;

pub const CORRELATION_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

const DEFAULT_DAYS_BACK: u32 = 7;
const MAX_DAYS_BACK: u32 = 365;

/// Query parameters for the pending review listing.
#[derive(Debug, Deserialize)]
pub struct PendingParams {
    pub days_back: Option<u32>,
}

/// `POST /api/analyze` with a JSON body.
pub async fn analyze_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<UrlAnalysisParams>, JsonRejection>,
) -> Response {
    let mut params = match body {
        Ok(Json(params)) => params,
        Err(rejection) => {
            debug!("Rejected analyze body: {}", rejection.body_text());
            return error_response(
                StatusCode::BAD_REQUEST,
                ErrorInfo::invalid_request(rejection.body_text()),
            );
        }
    };
    if params.correlation_id.is_none() {
        params.correlation_id = header_correlation_id(&headers);
    }

    let processor = state.processor.clone();
    let cancel = Cancellation::new();
    let task_cancel = cancel.clone();
    run_until_complete(cancel, async move {
        processor.analyze_by_url(params, &task_cancel).await
    })
    .await
}

/// `POST /api/analyze/upload` with a multipart body holding a `file` part.
pub async fn analyze_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let max_mb = state.processor.request_policy().max_file_size_mb;
    let mut params = match read_upload(multipart, max_mb).await {
        Ok(params) => params,
        Err(err) => {
            let status = status_for(&err);
            return error_response(status, err);
        }
    };
    if params.correlation_id.is_none() {
        params.correlation_id = header_correlation_id(&headers);
    }

    let processor = state.processor.clone();
    let cancel = Cancellation::new();
    let task_cancel = cancel.clone();
    run_until_complete(cancel, async move {
        processor.analyze_by_bytes(params, &task_cancel).await
    })
    .await
}

/// `GET /api/health`: 200 when every component is healthy, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.processor.health_check().await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// `GET /api/review/pending?days_back=N`
pub async fn list_pending(
    State(state): State<AppState>,
    Query(params): Query<PendingParams>,
) -> Response {
    let days_back = params
        .days_back
        .unwrap_or(DEFAULT_DAYS_BACK)
        .min(MAX_DAYS_BACK);

    match state.processor.router().list_pending(days_back).await {
        Ok(summaries) => Json(summaries).into_response(),
        Err(e) => storage_error_response(e),
    }
}

/// `GET /api/review/:analysis_id`
pub async fn review_detail(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> Response {
    match state.processor.router().find_metadata(&analysis_id).await {
        Ok(Some(metadata)) => Json(metadata).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            ErrorInfo::invalid_request(format!("No stored review for {}", analysis_id))
                .with_action("Check the analysis id returned by the analyze call"),
        ),
        Err(e) => storage_error_response(e),
    }
}

/// Run `work` on its own task.
///
/// If this handler future is dropped (the client disconnected) the guard
/// cancels the request; the task then finishes its current step and stops.
async fn run_until_complete<F>(cancel: Cancellation, work: F) -> Response
where
    F: Future<Output = AnalysisResult> + Send + 'static,
{
    let guard = cancel.guard();
    let outcome = tokio::spawn(work).await;
    guard.disarm();

    match outcome {
        Ok(result) => result_response(result),
        Err(e) => {
            warn!("Analysis task failed to complete: {}", e);
            let err = ErrorInfo::internal(e.to_string());
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.public())
        }
    }
}

fn result_response(result: AnalysisResult) -> Response {
    let status =
        StatusCode::from_u16(result.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let correlation = HeaderValue::from_str(&result.correlation_id).ok();

    let mut response = (status, Json(result)).into_response();
    if let Some(value) = correlation {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

fn error_response(status: StatusCode, err: ErrorInfo) -> Response {
    (status, Json(err)).into_response()
}

fn storage_error_response(err: StorageError) -> Response {
    match err {
        StorageError::InvalidKey(key) => error_response(
            StatusCode::BAD_REQUEST,
            ErrorInfo::invalid_request(format!("Invalid analysis id: {}", key)),
        ),
        other => {
            warn!("Review storage query failed: {}", other);
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorInfo::new(ErrorKind::StorageFailure, "Review storage is unavailable")
                    .with_details(other.to_string()),
            )
        }
    }
}

fn status_for(err: &ErrorInfo) -> StatusCode {
    StatusCode::from_u16(err.kind.http_status()).unwrap_or(StatusCode::BAD_REQUEST)
}

fn header_correlation_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(&CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Collect the multipart form into upload parameters.
async fn read_upload(mut multipart: Multipart, max_mb: u64) -> Result<FileAnalysisParams, ErrorInfo> {
    let mut params = FileAnalysisParams::default();
    let mut saw_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_mb))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        mime_guess::from_path(&filename)
                            .first_or_octet_stream()
                            .essence_str()
                            .to_string()
                    });
                let data = field.bytes().await.map_err(|e| multipart_error(e, max_mb))?;

                params.filename = filename;
                params.content_type = content_type;
                params.data = data.to_vec();
                saw_file = true;
            }
            "model_id" | "confidence_threshold" | "correlation_id" | "document_type"
            | "metadata" => {
                let text = field.text().await.map_err(|e| multipart_error(e, max_mb))?;
                apply_form_field(&mut params, &name, text)?;
            }
            other => debug!("Ignoring unknown form field '{}'", other),
        }
    }

    if !saw_file {
        return Err(ErrorInfo::invalid_request(
            "Multipart body must contain a 'file' part",
        ));
    }
    Ok(params)
}

fn apply_form_field(
    params: &mut FileAnalysisParams,
    name: &str,
    text: String,
) -> Result<(), ErrorInfo> {
    let text = text.trim().to_string();
    if text.is_empty() {
        return Ok(());
    }
    match name {
        "model_id" => params.model_id = Some(text),
        "correlation_id" => params.correlation_id = Some(text),
        "document_type" => params.document_type = Some(text),
        "confidence_threshold" => {
            let value = text.parse::<f64>().map_err(|_| {
                ErrorInfo::invalid_request(format!(
                    "confidence_threshold must be a number, got '{}'",
                    text
                ))
            })?;
            params.confidence_threshold = Some(value);
        }
        "metadata" => {
            let value = serde_json::from_str(&text).map_err(|e| {
                ErrorInfo::invalid_request(format!("metadata is not valid JSON: {}", e))
            })?;
            params.metadata = Some(value);
        }
        _ => {}
    }
    Ok(())
}

fn multipart_error(err: MultipartError, max_mb: u64) -> ErrorInfo {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ErrorInfo::new(
            ErrorKind::FileTooLarge,
            format!("Upload exceeds the maximum size of {} MB", max_mb),
        )
        .with_action(format!("Upload a document smaller than {} MB", max_mb))
    } else {
        ErrorInfo::invalid_request(format!("Malformed multipart body: {}", err.body_text()))
    }
}
