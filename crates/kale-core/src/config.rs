//! Configuration loading and parsing for the checker
//!
//! Provides functionality to load and parse `kale.toml` configuration files.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::diagnostic::Severity;

pub const CONFIG_FILENAME: &str = "kale.toml";

const KNOWN_TOP_LEVEL_KEYS: &[&str] = &["check"];
const KNOWN_CHECK_KEYS: &[&str] = &["unused_values", "unreachable"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid TOML in '{path}': {message}")]
    ParseError { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default)]
pub struct ConfigResult {
    pub config: Config,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub check: CheckConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct CheckConfig {
    pub unused_values: UnusedValues,
    pub unreachable: UnreachableLevel,
}

/// What happens to the result of an expression used as a statement.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnusedValues {
    #[default]
    Discard,
    Error,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnreachableLevel {
    #[default]
    Error,
    Warning,
    Allow,
}

impl UnreachableLevel {
    /// Severity for unreachable-code diagnostics, or `None` when the pass is off.
    pub fn severity(self) -> Option<Severity> {
        match self {
            UnreachableLevel::Error => Some(Severity::Error),
            UnreachableLevel::Warning => Some(Severity::Warning),
            UnreachableLevel::Allow => None,
        }
    }
}

pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }
        if !current.pop() {
            return None;
        }
    }
}

fn read_config(path: &Path) -> Result<(String, Config), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;

    Ok((content, config))
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    read_config(path).map(|(_, config)| config)
}

pub fn load_config_with_warnings(path: &Path) -> Result<ConfigResult, ConfigError> {
    let (content, config) = read_config(path)?;
    let warnings = detect_unknown_keys(&content);

    Ok(ConfigResult { config, warnings })
}

fn detect_unknown_keys(content: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    let table: toml::Table = match content.parse() {
        Ok(t) => t,
        Err(_) => return warnings,
    };

    let known_top: HashSet<&str> = KNOWN_TOP_LEVEL_KEYS.iter().copied().collect();
    for key in table.keys() {
        if !known_top.contains(key.as_str()) {
            warnings.push(format!("Unknown config option: '{}'", key));
        }
    }

    if let Some(toml::Value::Table(check)) = table.get("check") {
        let known_check: HashSet<&str> = KNOWN_CHECK_KEYS.iter().copied().collect();
        for key in check.keys() {
            if !known_check.contains(key.as_str()) {
                warnings.push(format!("Unknown config option in [check]: '{}'", key));
            }
        }
    }

    warnings
}

pub fn load_config_or_default(start_dir: &Path) -> Config {
    find_config_file(start_dir)
        .and_then(|path| load_config(&path).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn create_temp_dir() -> tempfile::TempDir {
        tempfile::tempdir().expect("Failed to create temp dir")
    }

    #[test]
    fn load_config_from_file() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &config_path,
            r#"
[check]
unused_values = "error"
unreachable = "warning"
"#,
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();

        assert_eq!(config.check.unused_values, UnusedValues::Error);
        assert_eq!(config.check.unreachable, UnreachableLevel::Warning);
    }

    #[test]
    fn default_config_when_missing() {
        let dir = create_temp_dir();
        let config = load_config_or_default(dir.path());

        assert_eq!(config, Config::default());
        assert_eq!(config.check.unused_values, UnusedValues::Discard);
        assert_eq!(config.check.unreachable, UnreachableLevel::Error);
    }

    #[test]
    fn error_on_invalid_toml() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "this is not valid { toml }").unwrap();

        let result = load_config(&config_path);

        match result.unwrap_err() {
            ConfigError::ParseError { path, message } => {
                assert_eq!(path, config_path);
                assert!(!message.is_empty());
            }
            _ => panic!("Expected ParseError"),
        }
    }

    #[test]
    fn error_on_unknown_policy_value() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "[check]\nunreachable = \"sometimes\"").unwrap();

        assert!(matches!(
            load_config(&config_path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn error_on_missing_file() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);

        assert!(matches!(
            load_config(&config_path),
            Err(ConfigError::ReadError { .. })
        ));
    }

    #[test]
    fn find_config_file_in_current_directory() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "").unwrap();

        let found = find_config_file(dir.path());

        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn find_config_file_in_parent_directory() {
        let parent = create_temp_dir();
        let child = parent.path().join("subdir");
        fs::create_dir(&child).unwrap();
        let config_path = parent.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "").unwrap();

        let found = find_config_file(&child);

        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn partial_config_uses_defaults() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "[check]\nunreachable = \"allow\"").unwrap();

        let config = load_config(&config_path).unwrap();

        assert_eq!(config.check.unreachable, UnreachableLevel::Allow);
        assert_eq!(config.check.unused_values, UnusedValues::Discard);
    }

    #[test]
    fn empty_config_file_uses_defaults() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "").unwrap();

        let config = load_config(&config_path).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn unreachable_level_maps_to_severity() {
        assert_eq!(UnreachableLevel::Error.severity(), Some(Severity::Error));
        assert_eq!(UnreachableLevel::Warning.severity(), Some(Severity::Warning));
        assert_eq!(UnreachableLevel::Allow.severity(), None);
    }

    #[test]
    fn warns_on_unknown_keys() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &config_path,
            r#"
optimize = true

[check]
unreachable = "warning"
strict = true
"#,
        )
        .unwrap();

        let result = load_config_with_warnings(&config_path).unwrap();

        assert_eq!(result.config.check.unreachable, UnreachableLevel::Warning);
        assert_eq!(
            result.warnings,
            vec![
                "Unknown config option: 'optimize'".to_string(),
                "Unknown config option in [check]: 'strict'".to_string(),
            ]
        );
    }

    #[test]
    fn config_error_display_is_helpful() {
        let err = ConfigError::ParseError {
            path: PathBuf::from("/path/to/kale.toml"),
            message: "expected `=`".to_string(),
        };

        let msg = format!("{}", err);

        assert!(msg.contains("/path/to/kale.toml"));
        assert!(msg.contains("expected `=`"));
    }
}
