//! Configuration display command.

use console::style;

use crate::config::Settings;

/// Print the effective settings after defaults, file and environment.
pub fn cmd_config_show(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let source = settings
        .config_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "none (defaults and environment)".to_string());
    eprintln!("{} Config file: {}", style("→").dim(), source);

    let value = settings_value(settings)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", toml::to_string_pretty(&value)?);
    }
    Ok(())
}

/// Settings as a JSON object without null entries, which TOML cannot express.
fn settings_value(settings: &Settings) -> anyhow::Result<serde_json::Value> {
    let mut value = serde_json::to_value(settings)?;
    if let Some(map) = value.as_object_mut() {
        map.retain(|_, v| !v.is_null());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_value_hides_key_and_nulls() {
        let settings = Settings {
            document_intelligence_key: "secret".to_string(),
            ..Default::default()
        };
        let value = settings_value(&settings).unwrap();
        assert!(value.get("document_intelligence_key").is_none());
        assert!(value.get("config_path").is_none());
        assert_eq!(value["confidence_threshold"], 0.7);
        assert!(toml::to_string_pretty(&value).is_ok());
    }
}
