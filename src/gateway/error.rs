//! Errors reported by analysis backends.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Rate limited by {backend}, retry after {retry_after:?}")]
    RateLimited {
        backend: String,
        retry_after: Option<Duration>,
    },

    #[error("{backend} returned server error HTTP {status}")]
    Server {
        backend: String,
        status: u16,
        retry_after: Option<Duration>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("Authentication rejected with HTTP {status}")]
    Auth { status: u16 },

    #[error("Request rejected with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),
}

impl BackendError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::RateLimited { .. }
                | BackendError::Server { .. }
                | BackendError::Network(_)
                | BackendError::Timeout(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Timeout(_))
    }

    /// Wait hint supplied by the service, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            BackendError::RateLimited { retry_after, .. }
            | BackendError::Server { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Map an HTTP status to an error class.
    pub fn from_status(
        backend: &str,
        status: u16,
        retry_after: Option<Duration>,
        body: &str,
    ) -> Self {
        match status {
            429 => BackendError::RateLimited {
                backend: backend.to_string(),
                retry_after,
            },
            401 | 403 => BackendError::Auth { status },
            500..=599 => BackendError::Server {
                backend: backend.to_string(),
                status,
                retry_after,
            },
            _ => BackendError::Rejected {
                status,
                message: truncate(body, 500),
            },
        }
    }

    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(timeout)
        } else if err.is_decode() {
            BackendError::Malformed(err.to_string())
        } else {
            BackendError::Network(err.to_string())
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let hint = Some(Duration::from_secs(3));
        assert!(BackendError::from_status("di", 429, hint, "").is_transient());
        assert!(BackendError::from_status("di", 503, None, "").is_transient());
        assert!(BackendError::from_status("di", 500, None, "").is_transient());
        assert!(!BackendError::from_status("di", 400, None, "bad").is_transient());
        assert!(!BackendError::from_status("di", 404, None, "").is_transient());
        assert!(matches!(
            BackendError::from_status("di", 401, None, ""),
            BackendError::Auth { status: 401 }
        ));
    }

    #[test]
    fn test_retry_after_carried() {
        let err = BackendError::from_status("di", 429, Some(Duration::from_secs(9)), "");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(9)));
        assert_eq!(BackendError::Network("reset".into()).retry_after(), None);
    }

    #[test]
    fn test_rejected_body_truncated() {
        let body = "x".repeat(2000);
        match BackendError::from_status("di", 400, None, &body) {
            BackendError::Rejected { message, .. } => assert!(message.len() < 600),
            other => panic!("unexpected {:?}", other),
        }
    }
}
