use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{cache::CacheConfig, database::DatabaseConfig, observability::ObservabilityConfig};
use crate::validation::ConfigValidator;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Loads defaults, then the TOML file, then `TASKCACHE__*` environment variables.
    ///
    /// An explicit path must exist. Without one the first existing default path
    /// is used, if any.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("database.url", defaults.database.url)?
            .set_default("database.max_connections", defaults.database.max_connections as i64)?
            .set_default("database.min_connections", defaults.database.min_connections as i64)?
            .set_default(
                "database.connection_timeout_seconds",
                defaults.database.connection_timeout_seconds as i64,
            )?
            .set_default("cache.enabled", defaults.cache.enabled)?
            .set_default("cache.redis_url", defaults.cache.redis_url)?
            .set_default("cache.task_ttl_seconds", defaults.cache.task_ttl_seconds as i64)?
            .set_default(
                "cache.connection_timeout_seconds",
                defaults.cache.connection_timeout_seconds as i64,
            )?
            .set_default(
                "cache.command_timeout_seconds",
                defaults.cache.command_timeout_seconds as i64,
            )?
            .set_default("cache.coalesce_misses", defaults.cache.coalesce_misses)?
            .set_default("cache.track_completeness", defaults.cache.track_completeness)?
            .set_default("observability.log_level", defaults.observability.log_level)?
            .set_default("observability.log_format", defaults.observability.log_format)?;

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("config file does not exist: {}", path));
            }
        } else {
            let default_paths = ["config/taskcache.toml", "taskcache.toml"];
            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("TASKCACHE")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("failed to parse TOML config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config to TOML")
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.database.validate()?;
        self.cache.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.cache.task_ttl_seconds, 60);
        assert_eq!(config.observability.log_format, "pretty");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_app_config_from_toml() {
        let toml_str = r#"
[database]
url = "postgresql://localhost/tasks"
max_connections = 20
min_connections = 2
connection_timeout_seconds = 10

[cache]
enabled = true
redis_url = "redis://redis:6379"
key_prefix = "todo"
task_ttl_seconds = 120
connection_timeout_seconds = 5
command_timeout_seconds = 2
coalesce_misses = true

[observability]
log_level = "debug"
log_format = "json"
"#;

        let config = AppConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.database.max_connections, 20);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.key_prefix.as_deref(), Some("todo"));
        assert_eq!(config.cache.task_ttl_seconds, 120);
        assert!(config.cache.coalesce_misses);
        assert!(!config.cache.track_completeness);
        assert_eq!(config.observability.log_format, "json");
    }

    #[test]
    fn test_app_config_rejects_invalid_toml_values() {
        let toml_str = r#"
[database]
url = "sqlite::memory:"
max_connections = 1
min_connections = 1
connection_timeout_seconds = 10

[cache]
enabled = false
redis_url = "redis://localhost:6379"
task_ttl_seconds = 60
connection_timeout_seconds = 5
command_timeout_seconds = 2

[observability]
log_level = "loud"
log_format = "json"
"#;
        assert!(AppConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_app_config_toml_roundtrip() {
        let config = AppConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.database.url, config.database.url);
        assert_eq!(parsed.cache.task_ttl_seconds, config.cache.task_ttl_seconds);
    }

    #[test]
    fn test_load_merges_file_over_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[cache]
task_ttl_seconds = 15
track_completeness = true
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.cache.task_ttl_seconds, 15);
        assert!(config.cache.track_completeness);
        assert_eq!(config.database.url, "sqlite::memory:");
    }

    #[test]
    fn test_load_missing_explicit_file() {
        assert!(AppConfig::load(Some("/nonexistent/taskcache.toml")).is_err());
    }
}
