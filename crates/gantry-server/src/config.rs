//! Server configuration types.
//!
//! # Example
//!
//! ```rust
//! use gantry_server::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::builder()
//!     .http_addr("127.0.0.1:8080")
//!     .http_addr("[::1]:8080")
//!     .shutdown_timeout(Duration::from_secs(10))
//!     .build();
//!
//! assert_eq!(config.http_addrs(), ["127.0.0.1:8080", "[::1]:8080"]);
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ServerError;

/// Default HTTP bind address.
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default maximum request body size (2 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// Server configuration.
///
/// Use [`ServerConfig::builder()`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listener addresses; one accept loop per entry.
    http_addrs: Vec<String>,

    /// How long to wait for open connections to finish on shutdown.
    shutdown_timeout: Duration,

    /// Bound on reading the body and on waiting for the response head.
    request_timeout: Duration,

    /// Largest accepted request body.
    max_body_size: usize,

    /// Whether to accept h2c prior-knowledge connections.
    http2_enabled: bool,
}

impl ServerConfig {
    /// Creates a new server configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Returns the configured listener addresses.
    #[must_use]
    pub fn http_addrs(&self) -> &[String] {
        &self.http_addrs
    }

    /// Parses every listener address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidAddress`] for the first address that is
    /// not a valid `ip:port`.
    pub fn socket_addrs(&self) -> Result<Vec<SocketAddr>, ServerError> {
        self.http_addrs
            .iter()
            .map(|addr| {
                addr.parse().map_err(|e| ServerError::InvalidAddress {
                    addr: addr.clone(),
                    reason: format!("{e}"),
                })
            })
            .collect()
    }

    /// Returns the graceful shutdown timeout.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the maximum request body size in bytes.
    #[must_use]
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Returns whether HTTP/2 is enabled.
    #[must_use]
    pub fn http2_enabled(&self) -> bool {
        self.http2_enabled
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct ServerConfigBuilder {
    http_addrs: Vec<String>,
    shutdown_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    max_body_size: Option<usize>,
    http2_enabled: Option<bool>,
}

impl ServerConfigBuilder {
    /// Adds a listener address. May be called more than once.
    ///
    /// Without any, the server listens on [`DEFAULT_HTTP_ADDR`].
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.http_addrs.push(addr.into());
        self
    }

    /// Replaces the listener addresses.
    pub fn http_addrs<I, S>(mut self, addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.http_addrs = addrs.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the graceful shutdown timeout.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Sets the per-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the maximum request body size in bytes.
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = Some(bytes);
        self
    }

    /// Enables or disables h2c.
    pub fn http2_enabled(mut self, enabled: bool) -> Self {
        self.http2_enabled = Some(enabled);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        let http_addrs = if self.http_addrs.is_empty() {
            vec![DEFAULT_HTTP_ADDR.to_string()]
        } else {
            self.http_addrs
        };

        ServerConfig {
            http_addrs,
            shutdown_timeout: self
                .shutdown_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS)),
            request_timeout: self
                .request_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            max_body_size: self.max_body_size.unwrap_or(DEFAULT_MAX_BODY_SIZE),
            http2_enabled: self.http2_enabled.unwrap_or(true),
        }
    }
}
