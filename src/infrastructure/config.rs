//! Configuration loading and validation.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid api.port: 0")]
    InvalidApiPort,

    #[error("Invalid gateway.port: 0")]
    InvalidGatewayPort,

    #[error("Invalid database.max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid cleanup.interval_ms: 0")]
    InvalidCleanupInterval,

    #[error("Invalid messages.default_ttl_seconds: {0}. Must be between 1 and 86400")]
    InvalidDefaultTtl(i64),

    #[error("Invalid logging.level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid logging.format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("auth.secret is required in production mode")]
    MissingAuthSecret,
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. dcm.yaml (project config)
    /// 3. dcm.local.yaml (local overrides, optional)
    /// 4. Environment variables (DCM_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("dcm.yaml"))
            .merge(Yaml::file("dcm.local.yaml"))
            .merge(Env::prefixed("DCM_").split("__"))
            .extract()
            .context("Failed to extract configuration")?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("DCM_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.api.port == 0 {
            return Err(ConfigError::InvalidApiPort);
        }
        if config.gateway.port == 0 {
            return Err(ConfigError::InvalidGatewayPort);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }
        if config.cleanup.interval_ms == 0 {
            return Err(ConfigError::InvalidCleanupInterval);
        }
        if !(1..=86_400).contains(&config.messages.default_ttl_seconds) {
            return Err(ConfigError::InvalidDefaultTtl(
                config.messages.default_ttl_seconds,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        // Production refuses to start without a real signing key; in
        // development a placeholder is tolerated with a warning at startup.
        if config.mode.is_production()
            && config.auth.secret.as_deref().is_none_or(|s| s.trim().is_empty())
        {
            return Err(ConfigError::MissingAuthSecret);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::Mode;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.api.port, 3847);
        assert_eq!(config.gateway.port, 3849);
        assert_eq!(config.messages.default_ttl_seconds, 3600);
        assert_eq!(config.cleanup.interval_ms, 60_000);
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn production_requires_secret() {
        let mut config = Config::default();
        config.mode = Mode::Production;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::MissingAuthSecret)
        ));

        config.auth.secret = Some("a-real-secret".into());
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn zero_ports_rejected() {
        let mut config = Config::default();
        config.api.port = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidApiPort)
        ));

        let mut config = Config::default();
        config.gateway.port = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidGatewayPort)
        ));
    }

    #[test]
    fn ttl_bounds_enforced() {
        let mut config = Config::default();
        config.messages.default_ttl_seconds = 0;
        assert!(ConfigLoader::validate(&config).is_err());
        config.messages.default_ttl_seconds = 86_401;
        assert!(ConfigLoader::validate(&config).is_err());
        config.messages.default_ttl_seconds = 86_400;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn yaml_overrides_defaults() {
        let yaml = r"
api:
  port: 4000
cleanup:
  stale_threshold_hours: 1.5
";
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
            .unwrap();
        assert_eq!(config.api.port, 4000);
        assert!((config.cleanup.stale_threshold_hours - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.gateway.port, 3849, "untouched values keep defaults");
    }

    #[test]
    fn yaml_parsing() {
        let yaml = r"
mode: production
gateway:
  port: 4849
  heartbeat_interval_secs: 15
auth:
  secret: super-secret
rate_limit:
  limit_writes: true
";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert!(config.mode.is_production());
        assert_eq!(config.gateway.port, 4849);
        assert_eq!(config.gateway.heartbeat_interval_secs, 15);
        assert_eq!(config.auth.secret.as_deref(), Some("super-secret"));
        assert!(config.rate_limit.limit_writes);
        ConfigLoader::validate(&config).expect("parsed config should be valid");
    }

    #[test]
    fn hierarchical_merging_prefers_later_files() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(base_file, "api:\n  port: 4100\ngateway:\n  port: 4200").unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "api:\n  port: 4300").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.api.port, 4300, "override should win");
        assert_eq!(config.gateway.port, 4200, "base value persists when not overridden");
    }
}
