//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `topomap.toml` in the working directory unless another path is
//! given. Every field has a default so the file is optional. Environment
//! variables take precedence over file values; command-line flags take
//! precedence over both and are applied by the commands.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use topomap_domain::schema::SchemaVersion;
use topomap_domain::validate::ValidationMode;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "topomap.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Manifest store settings.
    pub store: StoreConfig,
    /// Build pipeline settings.
    pub build: BuildConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// `SQLite` manifest store configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `SQLite` connection URL.
    pub url: String,
}

/// Pipeline configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Lineage new generations are appended to.
    pub lineage: String,
    pub mode: ValidationMode,
    pub schema_version: SchemaVersion,
    /// Directory of `schema-v<major>.<minor>.toml` files; built-in schemas
    /// are used when unset.
    pub schema_dir: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `path` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is malformed, or if an
    /// override or the resulting configuration is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = var("TOPOMAP_STORE_URL") {
            self.store.url = val;
        }
        if let Some(val) = var("TOPOMAP_LINEAGE") {
            self.build.lineage = val;
        }
        if let Some(val) = var("TOPOMAP_MODE") {
            self.build.mode = val
                .parse()
                .map_err(|err| ConfigError::Validation(format!("TOPOMAP_MODE: {err}")))?;
        }
        if let Some(val) = var("TOPOMAP_SCHEMA_VERSION") {
            self.build.schema_version = val.parse().map_err(|err| {
                ConfigError::Validation(format!("TOPOMAP_SCHEMA_VERSION: {err}"))
            })?;
        }
        if let Some(val) = var("TOPOMAP_SCHEMA_DIR") {
            self.build.schema_dir = Some(PathBuf::from(val));
        }
        if let Some(val) = var("TOPOMAP_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    /// Check invariants that the type system does not hold.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] on an empty lineage or store URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build.lineage.trim().is_empty() {
            return Err(ConfigError::Validation("lineage must not be empty".to_string()));
        }
        if self.store.url.trim().is_empty() {
            return Err(ConfigError::Validation("store url must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:topomap.db?mode=rwc".to_string(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            lineage: "default".to_string(),
            mode: ValidationMode::Strict,
            schema_version: SchemaVersion::V1,
            schema_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "topomap=info,topomap_app=info,sqlx=warn".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.store.url, "sqlite:topomap.db?mode=rwc");
        assert_eq!(config.build.lineage, "default");
        assert_eq!(config.build.mode, ValidationMode::Strict);
        assert_eq!(config.build.schema_version, SchemaVersion::V1);
        assert!(config.build.schema_dir.is_none());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.build.lineage, "default");
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [store]
            url = 'sqlite:test.db'

            [build]
            lineage = 'cabin'
            mode = 'lenient'
            schema_version = '1.2'
            schema_dir = 'schemas'

            [logging]
            filter = 'debug'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.store.url, "sqlite:test.db");
        assert_eq!(config.build.lineage, "cabin");
        assert_eq!(config.build.mode, ValidationMode::Lenient);
        assert_eq!(config.build.schema_version, SchemaVersion::new(1, 2));
        assert_eq!(config.build.schema_dir, Some(PathBuf::from("schemas")));
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let config: Config = toml::from_str("[build]\nlineage = 'cabin'").unwrap();
        assert_eq!(config.build.lineage, "cabin");
        assert_eq!(config.build.mode, ValidationMode::Strict);
        assert_eq!(config.store.url, "sqlite:topomap.db?mode=rwc");
    }

    #[test]
    fn should_report_parse_error_for_invalid_schema_version() {
        let result: Result<Config, _> = toml::from_str("[build]\nschema_version = 'one'");
        assert!(result.is_err());
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file(Path::new("nonexistent.toml")).unwrap();
        assert_eq!(config.build.lineage, "default");
    }

    #[test]
    fn should_apply_environment_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[
                ("TOPOMAP_STORE_URL", "sqlite::memory:"),
                ("TOPOMAP_LINEAGE", "garage"),
                ("TOPOMAP_MODE", "lenient"),
                ("TOPOMAP_SCHEMA_VERSION", "1.3"),
                ("TOPOMAP_SCHEMA_DIR", "/etc/topomap"),
                ("TOPOMAP_LOG", "warn"),
            ]))
            .unwrap();
        assert_eq!(config.store.url, "sqlite::memory:");
        assert_eq!(config.build.lineage, "garage");
        assert_eq!(config.build.mode, ValidationMode::Lenient);
        assert_eq!(config.build.schema_version, SchemaVersion::new(1, 3));
        assert_eq!(config.build.schema_dir, Some(PathBuf::from("/etc/topomap")));
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn should_prefer_rust_log_over_topomap_log() {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[("TOPOMAP_LOG", "warn"), ("RUST_LOG", "trace")]))
            .unwrap();
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_reject_invalid_mode_override() {
        let mut config = Config::default();
        let result = config.apply_overrides(env(&[("TOPOMAP_MODE", "sloppy")]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_empty_lineage() {
        let mut config = Config::default();
        config.build.lineage = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_accept_default_configuration() {
        assert!(Config::default().validate().is_ok());
    }
}
