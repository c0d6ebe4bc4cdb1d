//! Settings loading: defaults, then config file, then environment.

use std::path::PathBuf;

use super::{Config, ConfigError, Settings};

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Skip environment overrides. Used by tests.
    pub ignore_env: bool,
}

/// Load settings with explicit options.
/// Returns the resolved settings and the file config they came from.
pub async fn load_settings(options: LoadOptions) -> Result<(Settings, Config), ConfigError> {
    let config = match options.config_path {
        // An explicitly named file must exist and parse.
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir)?;
    if !options.ignore_env {
        settings.apply_env(|key| std::env::var(key).ok())?;
    }
    settings.validate()?;
    settings.config_path = config.source_path.clone();

    if let Some(ref path) = settings.config_path {
        tracing::debug!("Loaded config from {}", path.display());
    }
    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_explicit_file_applies_over_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docroute.toml");
        std::fs::write(
            &path,
            "confidence_threshold = 0.55\n[review_storage]\ndir = \"store\"\n",
        )
        .unwrap();

        let (settings, config) = load_settings(LoadOptions {
            config_path: Some(path.clone()),
            ignore_env: true,
        })
        .await
        .unwrap();
        assert_eq!(settings.confidence_threshold, 0.55);
        assert_eq!(settings.review_storage_dir, dir.path().join("store"));
        assert_eq!(settings.config_path, Some(path));
        assert_eq!(config.confidence_threshold, Some(0.55));
    }

    #[tokio::test]
    async fn test_env_beats_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docroute.toml");
        std::fs::write(&path, "confidence_threshold = 0.55\n").unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, dir.path()).unwrap();
        settings
            .apply_env(|key| (key == "CONFIDENCE_THRESHOLD").then(|| "0.95".to_string()))
            .unwrap();
        assert_eq!(settings.confidence_threshold, 0.95);
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_error() {
        let dir = tempdir().unwrap();
        let result = load_settings(LoadOptions {
            config_path: Some(dir.path().join("missing.toml")),
            ignore_env: true,
        })
        .await;
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[tokio::test]
    async fn test_invalid_file_value_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docroute.json");
        std::fs::write(&path, r#"{"confidence_threshold": 3.0}"#).unwrap();
        let result = load_settings(LoadOptions {
            config_path: Some(path),
            ignore_env: true,
        })
        .await;
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
