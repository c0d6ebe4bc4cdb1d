//! Resolved runtime settings.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use super::ConfigError;
use crate::gateway::DocumentIntelligenceConfig;
use crate::models::RequestPolicy;
use crate::retry::RetryPolicy;

pub const DEFAULT_CONTAINER: &str = "document-intelligence";
pub const DEFAULT_API_VERSION: &str = "2024-11-30";
pub const DEFAULT_BIND: &str = "127.0.0.1:7071";

/// Content types accepted when `ALLOWED_CONTENT_TYPES` is unset.
pub const DEFAULT_CONTENT_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/tiff",
    "image/bmp",
    "application/pdf",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Fs => "fs",
            StorageBackend::Memory => "memory",
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fs" | "file" | "filesystem" => Ok(StorageBackend::Fs),
            "memory" | "mem" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

/// Read-only view of the configuration after defaults, file and environment
/// have been applied.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub confidence_threshold: f64,
    pub default_model_id: String,
    /// Field requested from the analysis service.
    pub extraction_field_name: String,
    pub max_file_size_mb: u64,
    pub allowed_content_types: Vec<String>,
    /// Accept plain `http://` document URLs.
    pub allow_insecure_urls: bool,

    pub max_retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_jitter: bool,
    pub retry_after_seconds: u64,
    pub analysis_timeout: Duration,
    pub storage_timeout: Duration,

    pub document_intelligence_endpoint: String,
    #[serde(skip)]
    pub document_intelligence_key: String,
    pub document_intelligence_api_version: String,

    pub enable_review_storage: bool,
    pub storage_backend: StorageBackend,
    pub review_storage_dir: PathBuf,
    pub review_storage_container: String,

    pub bind: String,
    /// Config file the settings were read from, if any.
    pub config_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let review_storage_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docroute")
            .join("review");

        Self {
            confidence_threshold: 0.7,
            default_model_id: "serialnumber".to_string(),
            extraction_field_name: "Serial".to_string(),
            max_file_size_mb: 10,
            allowed_content_types: DEFAULT_CONTENT_TYPES.iter().map(|s| s.to_string()).collect(),
            allow_insecure_urls: false,
            max_retry_attempts: 3,
            retry_base_delay: Duration::from_secs(2),
            retry_jitter: true,
            retry_after_seconds: 60,
            analysis_timeout: Duration::from_secs(120),
            storage_timeout: Duration::from_secs(30),
            document_intelligence_endpoint: String::new(),
            document_intelligence_key: String::new(),
            document_intelligence_api_version: DEFAULT_API_VERSION.to_string(),
            enable_review_storage: true,
            storage_backend: StorageBackend::Fs,
            review_storage_dir,
            review_storage_container: DEFAULT_CONTAINER.to_string(),
            bind: DEFAULT_BIND.to_string(),
            config_path: None,
        }
    }
}

impl Settings {
    /// Override values from environment variables.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CONFIDENCE_THRESHOLD") {
            self.confidence_threshold = parse_env("CONFIDENCE_THRESHOLD", &v)?;
        }
        if let Some(v) = get("DEFAULT_MODEL_ID") {
            self.default_model_id = v.trim().to_string();
        }
        if let Some(v) = get("EXTRACTION_FIELD_NAME") {
            self.extraction_field_name = v.trim().to_string();
        }
        if let Some(v) = get("MAX_FILE_SIZE_MB") {
            self.max_file_size_mb = parse_env("MAX_FILE_SIZE_MB", &v)?;
        }
        if let Some(v) = get("ALLOWED_CONTENT_TYPES") {
            self.allowed_content_types = split_list(&v);
        }
        if let Some(v) = get("ALLOW_INSECURE_URLS") {
            self.allow_insecure_urls = parse_bool("ALLOW_INSECURE_URLS", &v)?;
        }
        if let Some(v) = get("MAX_RETRY_ATTEMPTS") {
            self.max_retry_attempts = parse_env("MAX_RETRY_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("RETRY_BASE_DELAY_SECONDS") {
            self.retry_base_delay = parse_seconds("RETRY_BASE_DELAY_SECONDS", &v)?;
        }
        if let Some(v) = get("RETRY_JITTER") {
            self.retry_jitter = parse_bool("RETRY_JITTER", &v)?;
        }
        if let Some(v) = get("RETRY_AFTER_SECONDS") {
            self.retry_after_seconds = parse_env("RETRY_AFTER_SECONDS", &v)?;
        }
        if let Some(v) = get("ANALYSIS_TIMEOUT_SECONDS") {
            self.analysis_timeout = parse_seconds("ANALYSIS_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = get("STORAGE_TIMEOUT_SECONDS") {
            self.storage_timeout = parse_seconds("STORAGE_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = get("DOCUMENT_INTELLIGENCE_ENDPOINT") {
            self.document_intelligence_endpoint = v.trim().to_string();
        }
        if let Some(v) = get("DOCUMENT_INTELLIGENCE_KEY") {
            self.document_intelligence_key = v.trim().to_string();
        }
        if let Some(v) = get("DOCUMENT_INTELLIGENCE_API_VERSION") {
            self.document_intelligence_api_version = v.trim().to_string();
        }
        if let Some(v) = get("ENABLE_REVIEW_STORAGE") {
            self.enable_review_storage = parse_bool("ENABLE_REVIEW_STORAGE", &v)?;
        }
        if let Some(v) = get("STORAGE_BACKEND") {
            self.storage_backend = v.parse().map_err(|reason| ConfigError::InvalidValue {
                key: "STORAGE_BACKEND".to_string(),
                value: v.clone(),
                reason,
            })?;
        }
        if let Some(v) = get("REVIEW_STORAGE_DIR") {
            self.review_storage_dir = PathBuf::from(shellexpand::tilde(v.trim()).as_ref());
        }
        if let Some(v) = get("REVIEW_STORAGE_CONTAINER") {
            self.review_storage_container = v.trim().to_string();
        }
        if let Some(v) = get("DOCROUTE_BIND") {
            self.bind = v.trim().to_string();
        }
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(invalid(
                "confidence_threshold",
                self.confidence_threshold,
                "must be between 0.0 and 1.0",
            ));
        }
        if self.max_retry_attempts == 0 {
            return Err(invalid("max_retry_attempts", 0, "must be at least 1"));
        }
        if self.max_file_size_mb == 0 {
            return Err(invalid("max_file_size_mb", 0, "must be at least 1"));
        }
        if self.allowed_content_types.is_empty() {
            return Err(invalid("allowed_content_types", "", "must not be empty"));
        }
        if self.extraction_field_name.is_empty() {
            return Err(invalid("extraction_field_name", "", "must not be empty"));
        }
        if self.review_storage_container.is_empty()
            || self.review_storage_container.contains(['/', '\\'])
        {
            return Err(invalid(
                "review_storage_container",
                &self.review_storage_container,
                "must be a single path segment",
            ));
        }
        Ok(())
    }

    pub fn request_policy(&self) -> RequestPolicy {
        RequestPolicy {
            default_threshold: self.confidence_threshold,
            default_model_id: self.default_model_id.clone(),
            max_file_size_mb: self.max_file_size_mb,
            allowed_content_types: self.allowed_content_types.clone(),
            allow_insecure_urls: self.allow_insecure_urls,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retry_attempts, self.retry_base_delay)
            .with_jitter(self.retry_jitter)
            .with_retry_after_hint(Duration::from_secs(self.retry_after_seconds))
    }

    pub fn document_intelligence(&self) -> DocumentIntelligenceConfig {
        DocumentIntelligenceConfig {
            endpoint: self.document_intelligence_endpoint.clone(),
            api_key: self.document_intelligence_key.clone(),
            api_version: self.document_intelligence_api_version.clone(),
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.request_policy().max_file_size_bytes()
    }
}

fn invalid(key: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, value, &e.to_string()))
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let secs: f64 = parse_env(key, value)?;
    Duration::try_from_secs_f64(secs).map_err(|e| invalid(key, value, &e.to_string()))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "expected true or false")),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.confidence_threshold, 0.7);
        assert_eq!(s.max_retry_attempts, 3);
        assert_eq!(s.retry_base_delay, Duration::from_secs(2));
        assert!(s.enable_review_storage);
        assert_eq!(s.default_model_id, "serialnumber");
        assert_eq!(s.max_file_size_mb, 10);
        assert_eq!(s.allowed_content_types.len(), 6);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut s = Settings::default();
        s.apply_env(env(&[
            ("CONFIDENCE_THRESHOLD", "0.85"),
            ("MAX_RETRY_ATTEMPTS", "5"),
            ("RETRY_BASE_DELAY_SECONDS", "0.5"),
            ("ENABLE_REVIEW_STORAGE", "false"),
            ("ALLOWED_CONTENT_TYPES", "image/png, Application/PDF"),
            ("STORAGE_BACKEND", "memory"),
        ]))
        .unwrap();
        assert_eq!(s.confidence_threshold, 0.85);
        assert_eq!(s.max_retry_attempts, 5);
        assert_eq!(s.retry_base_delay, Duration::from_millis(500));
        assert!(!s.enable_review_storage);
        assert_eq!(s.allowed_content_types, vec!["image/png", "application/pdf"]);
        assert_eq!(s.storage_backend, StorageBackend::Memory);
    }

    #[test]
    fn test_empty_env_values_ignored() {
        let mut s = Settings::default();
        s.apply_env(env(&[("CONFIDENCE_THRESHOLD", "  ")])).unwrap();
        assert_eq!(s.confidence_threshold, 0.7);
    }

    #[test]
    fn test_bad_env_value_is_error() {
        let mut s = Settings::default();
        let err = s
            .apply_env(env(&[("MAX_RETRY_ATTEMPTS", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("MAX_RETRY_ATTEMPTS"));

        let mut s = Settings::default();
        assert!(s.apply_env(env(&[("RETRY_JITTER", "maybe")])).is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let s = Settings {
            confidence_threshold: 1.2,
            ..Default::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_policies_follow_settings() {
        let s = Settings {
            max_retry_attempts: 4,
            retry_after_seconds: 30,
            retry_jitter: false,
            ..Default::default()
        };
        let retry = s.retry_policy();
        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.retry_after_secs(), 30);
        assert!(!retry.jitter);
        assert_eq!(s.request_policy().default_threshold, 0.7);
    }
}
