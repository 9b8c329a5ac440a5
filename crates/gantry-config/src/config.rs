//! Configuration schema.

use std::time::Duration;

use gantry_server::config::{
    DEFAULT_HTTP_ADDR, DEFAULT_MAX_BODY_SIZE, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
use gantry_server::ServerConfig;
use gantry_telemetry::LogConfig;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Root configuration.
///
/// Unknown fields are rejected so typos in files fail loudly.
///
/// ```toml
/// [server]
/// http_addrs = ["0.0.0.0:8080"]
/// shutdown_timeout_secs = 30
/// request_timeout_secs = 30
/// max_body_size = 2097152
/// http2_enabled = true
///
/// [logging]
/// level = "info"
/// json_format = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GantryConfig {
    /// Listener and request limits.
    pub server: ServerSection,
    /// Logging setup.
    pub logging: LogConfig,
}

/// The `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    /// Listener addresses.
    pub http_addrs: Vec<String>,
    /// Graceful shutdown timeout in seconds.
    pub shutdown_timeout_secs: u64,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Largest accepted request body in bytes.
    pub max_body_size: usize,
    /// Whether h2c prior-knowledge connections are accepted.
    pub http2_enabled: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addrs: vec![DEFAULT_HTTP_ADDR.to_string()],
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            http2_enabled: true,
        }
    }
}

impl GantryConfig {
    /// Development preset: pretty logs at `debug`, local listener.
    #[must_use]
    pub fn development() -> Self {
        Self {
            server: ServerSection {
                http_addrs: vec!["127.0.0.1:8080".to_string()],
                ..ServerSection::default()
            },
            logging: LogConfig::development(),
        }
    }

    /// Production preset, same as the defaults.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }

    /// Checks the values a server cannot start with.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let server = &self.server;
        if server.http_addrs.is_empty() {
            return Err(ConfigError::invalid_value(
                "server.http_addrs",
                "at least one address is required",
            ));
        }
        self.server_config()
            .socket_addrs()
            .map_err(|e| ConfigError::invalid_value("server.http_addrs", e.to_string()))?;

        if server.request_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_secs",
                "must be greater than zero",
            ));
        }
        if server.max_body_size == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_body_size",
                "must be greater than zero",
            ));
        }
        if self.logging.enabled {
            gantry_telemetry::create_env_filter(&self.logging.level)
                .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;
        }
        Ok(())
    }

    /// Builds the server configuration.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::from(&self.server)
    }

    /// Returns the logging configuration.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        self.logging.clone()
    }
}

impl From<&ServerSection> for ServerConfig {
    fn from(section: &ServerSection) -> Self {
        ServerConfig::builder()
            .http_addrs(section.http_addrs.iter().cloned())
            .shutdown_timeout(Duration::from_secs(section.shutdown_timeout_secs))
            .request_timeout(Duration::from_secs(section.request_timeout_secs))
            .max_body_size(section.max_body_size)
            .http2_enabled(section.http2_enabled)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_server_defaults() {
        let config = GantryConfig::default();
        assert_eq!(config.server_config(), ServerConfig::default());
        assert_eq!(config.log_config(), LogConfig::production());
        config.validate().unwrap();
    }

    #[test]
    fn test_development_preset() {
        let config = GantryConfig::development();
        assert_eq!(config.server.http_addrs, ["127.0.0.1:8080"]);
        assert!(!config.logging.json_format);
        config.validate().unwrap();
    }

    #[test]
    fn test_conversion() {
        let section = ServerSection {
            http_addrs: vec!["127.0.0.1:1".into(), "127.0.0.1:2".into()],
            shutdown_timeout_secs: 5,
            request_timeout_secs: 7,
            max_body_size: 1024,
            http2_enabled: false,
        };
        let server = ServerConfig::from(&section);
        assert_eq!(server.http_addrs(), ["127.0.0.1:1", "127.0.0.1:2"]);
        assert_eq!(server.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(server.request_timeout(), Duration::from_secs(7));
        assert_eq!(server.max_body_size(), 1024);
        assert!(!server.http2_enabled());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = GantryConfig::default();
        config.server.http_addrs = vec!["not-an-address".into()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "server.http_addrs"
        ));

        let mut config = GantryConfig::default();
        config.server.http_addrs.clear();
        assert!(config.validate().is_err());

        let mut config = GantryConfig::default();
        config.server.max_body_size = 0;
        assert!(config.validate().is_err());

        let mut config = GantryConfig::default();
        config.server.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = toml::from_str::<GantryConfig>("[server]\nhttp_adr = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("http_adr"));
    }
}
