//! Error taxonomy exposed to callers.
//!
//! Every failure that reaches a caller is one of eight [`ErrorKind`]s. The
//! kind alone decides how the failure propagates (see [`ErrorKind::class`])
//! and which HTTP status the server answers with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidRequest,
    UnsupportedFileType,
    FileTooLarge,
    ServiceUnavailable,
    AnalysisFailed,
    AnalysisTimeout,
    StorageFailure,
    InternalError,
}

/// Propagation class of an error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// Caller input is wrong. Never retried.
    ClientError,
    /// Retried internally; surfaced with a retry hint once exhausted.
    Transient,
    /// Retrying would not help. Details are withheld from callers.
    Fatal,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::InvalidRequest,
        ErrorKind::UnsupportedFileType,
        ErrorKind::FileTooLarge,
        ErrorKind::ServiceUnavailable,
        ErrorKind::AnalysisFailed,
        ErrorKind::AnalysisTimeout,
        ErrorKind::StorageFailure,
        ErrorKind::InternalError,
    ];

    /// The single lookup table from kind to (class, HTTP status).
    fn table(self) -> (StatusClass, u16) {
        match self {
            ErrorKind::InvalidRequest => (StatusClass::ClientError, 400),
            ErrorKind::UnsupportedFileType => (StatusClass::ClientError, 415),
            ErrorKind::FileTooLarge => (StatusClass::ClientError, 413),
            ErrorKind::ServiceUnavailable => (StatusClass::Transient, 503),
            ErrorKind::AnalysisTimeout => (StatusClass::Transient, 504),
            ErrorKind::StorageFailure => (StatusClass::Transient, 500),
            ErrorKind::AnalysisFailed => (StatusClass::Fatal, 502),
            ErrorKind::InternalError => (StatusClass::Fatal, 500),
        }
    }

    pub fn class(self) -> StatusClass {
        self.table().0
    }

    pub fn http_status(self) -> u16 {
        self.table().1
    }

    pub fn is_retryable(self) -> bool {
        self.class() == StatusClass::Transient
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "INVALID_REQUEST",
            ErrorKind::UnsupportedFileType => "UNSUPPORTED_FILE_TYPE",
            ErrorKind::FileTooLarge => "FILE_TOO_LARGE",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorKind::AnalysisFailed => "ANALYSIS_FAILED",
            ErrorKind::AnalysisTimeout => "ANALYSIS_TIMEOUT",
            ErrorKind::StorageFailure => "STORAGE_FAILURE",
            ErrorKind::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Message shown to callers when the real cause must not leak.
    fn generic_message(self) -> &'static str {
        match self {
            ErrorKind::AnalysisFailed => "Document analysis failed",
            _ => "Internal error while processing the document",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured error carried on results and sub-operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            retry_after_seconds: None,
            suggested_action: None,
            timestamp: Utc::now(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
            .with_action("Review and correct the request parameters")
    }

    pub fn unsupported_file_type(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedFileType, message)
            .with_action("Upload a PDF, JPEG, PNG, TIFF or BMP document")
    }

    pub fn file_too_large(size_bytes: usize, max_mb: u64) -> Self {
        Self::new(
            ErrorKind::FileTooLarge,
            format!(
                "File size {:.1}MB exceeds maximum allowed {}MB",
                size_bytes as f64 / (1024.0 * 1024.0),
                max_mb
            ),
        )
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::InternalError,
            "Unexpected error during document processing",
        )
        .with_details(details)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_seconds = Some(seconds);
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.suggested_action = Some(action.into());
        self
    }

    pub fn class(&self) -> StatusClass {
        self.kind.class()
    }

    /// Copy suitable for callers: fatal errors lose their message and details.
    pub fn public(&self) -> Self {
        if self.class() != StatusClass::Fatal {
            return self.clone();
        }
        Self {
            kind: self.kind,
            message: self.kind.generic_message().to_string(),
            details: None,
            retry_after_seconds: None,
            suggested_action: Some("Contact support with the correlation id".to_string()),
            timestamp: self.timestamp,
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}: {} ({})", self.kind, self.message, details),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}
