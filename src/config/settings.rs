use anyhow::Result;
use directories::ProjectDirs;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use super::AppConfig;
use crate::core::TextRule;

const APP_NAME: &str = "Filtree";
const CONFIG_FILE: &str = "config.json";

/// Returns the platform-specific configuration directory for the application.
pub fn get_config_directory() -> Option<PathBuf> {
    ProjectDirs::from("com", "filtree", APP_NAME)
        .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
}

/// Returns the full path to the configuration file.
pub fn get_config_file_path() -> Option<PathBuf> {
    get_config_directory().map(|dir| dir.join(CONFIG_FILE))
}

fn resolve_config_path(path_override: Option<&Path>) -> Result<PathBuf> {
    match path_override {
        Some(path) => Ok(path.to_path_buf()),
        None => get_config_file_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory")),
    }
}

/// Loads the application configuration from the config file.
///
/// If the file doesn't exist, it creates a default one. If the file cannot be
/// parsed as a complete record, every field that is still readable is kept and
/// the rest falls back to defaults. A file that cannot be read as text, or content
/// that is not a JSON object at all, yields the default configuration.
pub fn load_config(path_override: Option<&Path>) -> Result<AppConfig> {
    let config_path = resolve_config_path(path_override)?;

    if !config_path.exists() {
        tracing::info!(
            "Config file not found, creating default config at {:?}",
            config_path
        );
        let default_config = AppConfig::default();
        save_config(&default_config, Some(&config_path))?;
        return Ok(default_config);
    }

    let config_content = match fs::read_to_string(&config_path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(
                "Failed to read config file at {:?}: {}. Using default config.",
                config_path,
                e
            );
            return Ok(AppConfig::default());
        }
    };

    let config = match serde_json::from_str::<AppConfig>(&config_content) {
        Ok(config) => {
            tracing::info!("Loaded config from {:?}", config_path);
            config
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse config file at {:?}: {}. Merging readable fields with defaults.",
                config_path,
                e
            );
            merge_with_defaults(&config_content).unwrap_or_else(|e| {
                tracing::warn!("Config is unreadable ({}), using default config.", e);
                AppConfig::default()
            })
        }
    };

    Ok(normalize(config))
}

fn normalize(mut config: AppConfig) -> AppConfig {
    config.rules = config.rules.normalized();
    config
}

/// Builds a configuration from a partially-shaped record.
///
/// Starts from the default record and takes over each field of the stored
/// record that deserializes on its own. Text rules are checked one by one, so
/// a single malformed rule does not discard the others.
fn merge_with_defaults(config_content: &str) -> Result<AppConfig> {
    let stored: Value = serde_json::from_str(config_content)?;
    let stored = stored
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("Config is not a JSON object"))?;

    let mut merged = match serde_json::to_value(AppConfig::default())? {
        Value::Object(map) => map,
        _ => anyhow::bail!("Default config did not serialize to an object"),
    };

    let keys: Vec<String> = merged.keys().cloned().collect();
    for key in keys {
        let Some(value) = stored.get(&key) else {
            continue;
        };

        let value = if key == "textRules" {
            readable_text_rules(value)
        } else {
            value.clone()
        };

        if field_is_readable(&merged, &key, &value) {
            merged.insert(key, value);
        } else {
            tracing::warn!("Ignoring unreadable config field `{}`: {}", key, value);
        }
    }

    let migrated_config: AppConfig = serde_json::from_value(Value::Object(merged))?;
    tracing::info!("Successfully merged partial config with defaults");
    Ok(migrated_config)
}

fn readable_text_rules(value: &Value) -> Value {
    match value {
        Value::Array(rules) => Value::Array(
            rules
                .iter()
                .filter(|rule| serde_json::from_value::<TextRule>((*rule).clone()).is_ok())
                .cloned()
                .collect(),
        ),
        other => other.clone(),
    }
}

fn field_is_readable(base: &Map<String, Value>, key: &str, value: &Value) -> bool {
    let mut candidate = base.clone();
    candidate.insert(key.to_string(), value.clone());
    serde_json::from_value::<AppConfig>(Value::Object(candidate)).is_ok()
}

/// Saves the provided configuration to the config file.
pub fn save_config(config: &AppConfig, path_override: Option<&Path>) -> Result<()> {
    let config_path = resolve_config_path(path_override)?;

    // Create config directory if it doesn't exist.
    if let Some(config_dir) = config_path.parent() {
        if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
            tracing::info!("Created config directory: {:?}", config_dir);
        }
    }

    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, config_json)?;
    tracing::info!("Saved config to {:?}", config_path);

    Ok(())
}

/// Exports the current configuration to a user-specified JSON file.
pub fn export_config(config: &AppConfig, export_path: &Path) -> Result<()> {
    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(export_path, config_json)?;
    tracing::info!("Exported config to {:?}", export_path);
    Ok(())
}

/// Imports an application configuration from a user-specified JSON file.
///
/// Unlike [`load_config`], content that is not a JSON object is an error.
pub fn import_config(import_path: &Path) -> Result<AppConfig> {
    let config_content = fs::read_to_string(import_path)?;
    let config = match serde_json::from_str::<AppConfig>(&config_content) {
        Ok(config) => {
            tracing::info!("Imported config from {:?}", import_path);
            config
        }
        Err(_) => {
            tracing::info!("Importing partial config from {:?}", import_path);
            merge_with_defaults(&config_content)?
        }
    };
    Ok(normalize(config))
}

// Platform-specific configuration paths for reference:
// macOS:   ~/Library/Application Support/com.filtree.Filtree/
// Linux:   ~/.config/filtree/
// Windows: %APPDATA%/filtree/Filtree/config/

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ExtensionMode, RuleSet};
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_creates_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.json");

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config, AppConfig::default());
        assert!(path.exists(), "Default config should be written to disk");
    }

    #[test]
    fn test_saved_config_is_loaded_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.rules.extension_mode = ExtensionMode::Whitelist;
        config.rules.text_rules = vec![TextRule::blacklist("r1", "sample").regex()];
        config.max_scan_depth = 3;

        save_config(&config, Some(&path)).unwrap();

        assert_eq!(load_config(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_record_is_stored_flat() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        save_config(&AppConfig::default(), Some(&path)).unwrap();

        let stored: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        for key in ["extensionMode", "extensions", "textRulesEnabled", "textRules"] {
            assert!(stored.get(key).is_some(), "missing top-level key {key}");
        }
        assert_eq!(stored["extensionMode"], json!(0));
    }

    #[test]
    fn test_partial_record_merges_defaults_field_by_field() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let partial = json!({
            "extensionMode": 1,
            "extensions": [".MP4", "mkv"],
            "textRulesEnabled": "yes",
        });
        fs::write(&path, partial.to_string()).unwrap();

        let config = load_config(Some(&path)).unwrap();
        let defaults = AppConfig::default();

        assert_eq!(config.rules.extension_mode, ExtensionMode::Whitelist);
        assert_eq!(
            config.rules.extensions.iter().collect::<Vec<_>>(),
            vec!["mkv", "mp4"]
        );
        assert_eq!(
            config.rules.text_rules_enabled,
            defaults.rules.text_rules_enabled,
            "wrongly typed field falls back to its default"
        );
        assert_eq!(config.max_scan_depth, defaults.max_scan_depth);
    }

    #[test]
    fn test_malformed_text_rules_are_dropped_individually() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let partial = json!({
            "textRules": [
                { "id": "ok", "pattern": "sample" },
                { "id": "bad", "pattern": 42 },
            ],
        });
        fs::write(&path, partial.to_string()).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.rules.text_rules.len(), 1);
        assert_eq!(config.rules.text_rules[0].id, "ok");
        // Missing rule fields take the rule defaults.
        assert!(config.rules.text_rules[0].enabled);
        assert!(config.rules.text_rules[0].applies_to_files);
    }

    #[test]
    fn test_unreadable_content_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not_valid_json, }").unwrap();

        assert_eq!(load_config(Some(&path)).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_non_utf8_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x7b]).unwrap();

        assert_eq!(load_config(Some(&path)).unwrap(), AppConfig::default());
        // The unreadable file is left for the user to inspect.
        assert_eq!(fs::read(&path).unwrap(), vec![0xff, 0xfe, 0x00, 0x7b]);
    }

    #[test]
    fn test_config_path_that_is_a_directory_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::create_dir(&path).unwrap();

        assert_eq!(load_config(Some(&path)).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_import_rejects_non_json_and_accepts_exports() {
        let dir = tempdir().unwrap();
        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "[1, 2, 3]").unwrap();
        assert!(import_config(&corrupt).is_err());

        let exported = dir.path().join("exported.json");
        let config = AppConfig {
            rules: RuleSet {
                extension_mode: ExtensionMode::Blacklist,
                ..Default::default()
            },
            ..Default::default()
        };
        export_config(&config, &exported).unwrap();
        assert_eq!(import_config(&exported).unwrap(), config);
    }
}
