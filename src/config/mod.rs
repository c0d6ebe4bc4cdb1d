//! Configuration management using the prefer crate for file discovery.
//!
//! Precedence, lowest first: built-in defaults, the config file, then
//! environment variables (including a `.env` file loaded at startup).

mod loader;
mod settings;

pub use loader::{load_settings, LoadOptions};
pub use settings::{Settings, StorageBackend, DEFAULT_CONTENT_TYPES};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Retry tuning shared by analysis calls and storage writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_delay_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter: Option<bool>,
    /// Hint returned to callers once retries are exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentIntelligenceSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Per-attempt timeout including polling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewStorageSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// `fs` or `memory`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    /// Root directory for the filesystem store. Relative to the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

/// Contents of a `docroute.{toml,yaml,json}` file. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_size_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_content_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_insecure_urls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub document_intelligence: DocumentIntelligenceSection,
    #[serde(default)]
    pub review_storage: ReviewStorageSection,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover a `docroute` config file in the standard locations.
    /// Falls back to an empty config when none is found or it cannot be read.
    pub async fn load() -> Self {
        match prefer::load("docroute").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring unreadable config: {}", e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => Self::default(),
        }
    }

    /// Load a config file, choosing the parser from its extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };
        match ext {
            "toml" => toml::from_str(contents).map_err(|e| parse_err(e.to_string())),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| parse_err(e.to_string())),
            _ => serde_json::from_str(contents).map_err(|e| parse_err(e.to_string())),
        }
    }

    /// Directory of the config file, used to resolve relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Expand `~` and resolve relative paths against `base_dir`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    pub fn apply_to_settings(
        &self,
        settings: &mut Settings,
        base_dir: &Path,
    ) -> Result<(), ConfigError> {
        if let Some(threshold) = self.confidence_threshold {
            settings.confidence_threshold = threshold;
        }
        if let Some(ref model) = self.default_model_id {
            settings.default_model_id = model.clone();
        }
        if let Some(ref field) = self.extraction_field_name {
            settings.extraction_field_name = field.clone();
        }
        if let Some(size) = self.max_file_size_mb {
            settings.max_file_size_mb = size;
        }
        if let Some(ref types) = self.allowed_content_types {
            settings.allowed_content_types =
                types.iter().map(|t| t.trim().to_ascii_lowercase()).collect();
        }
        if let Some(insecure) = self.allow_insecure_urls {
            settings.allow_insecure_urls = insecure;
        }
        if let Some(ref bind) = self.bind {
            settings.bind = bind.clone();
        }

        if let Some(attempts) = self.retry.max_attempts {
            settings.max_retry_attempts = attempts;
        }
        if let Some(secs) = self.retry.base_delay_seconds {
            settings.retry_base_delay = std::time::Duration::try_from_secs_f64(secs).map_err(
                |e| ConfigError::InvalidValue {
                    key: "retry.base_delay_seconds".to_string(),
                    value: secs.to_string(),
                    reason: e.to_string(),
                },
            )?;
        }
        if let Some(jitter) = self.retry.jitter {
            settings.retry_jitter = jitter;
        }
        if let Some(secs) = self.retry.retry_after_seconds {
            settings.retry_after_seconds = secs;
        }

        let di = &self.document_intelligence;
        if let Some(ref endpoint) = di.endpoint {
            settings.document_intelligence_endpoint = endpoint.clone();
        }
        if let Some(ref key) = di.key {
            settings.document_intelligence_key = key.clone();
        }
        if let Some(ref version) = di.api_version {
            settings.document_intelligence_api_version = version.clone();
        }
        if let Some(secs) = di.timeout_seconds {
            settings.analysis_timeout = std::time::Duration::from_secs(secs);
        }

        let storage = &self.review_storage;
        if let Some(enabled) = storage.enabled {
            settings.enable_review_storage = enabled;
        }
        if let Some(ref backend) = storage.backend {
            settings.storage_backend =
                backend
                    .parse()
                    .map_err(|reason| ConfigError::InvalidValue {
                        key: "review_storage.backend".to_string(),
                        value: backend.clone(),
                        reason,
                    })?;
        }
        if let Some(ref dir) = storage.dir {
            settings.review_storage_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(ref container) = storage.container {
            settings.review_storage_container = container.clone();
        }
        if let Some(secs) = storage.timeout_seconds {
            settings.storage_timeout = std::time::Duration::from_secs(secs);
        }
        Ok(())
    }
}
