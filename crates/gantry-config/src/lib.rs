//! # Gantry Config
//!
//! Typed, layered configuration for Gantry servers.
//!
//! [`GantryConfig`] holds a `[server]` and a `[logging]` section. A
//! [`ConfigLoader`] builds one from defaults, TOML or JSON files and
//! `PREFIX__SECTION__KEY` environment variables, then validates it. The
//! result converts into a [`ServerConfig`](gantry_server::ServerConfig) and
//! a [`LogConfig`](gantry_telemetry::LogConfig).
//!
//! ## Example
//!
//! ```
//! use gantry_config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .with_string(r#"{"server": {"http2_enabled": false}}"#, "json")
//!     .unwrap()
//!     .load()
//!     .unwrap();
//!
//! assert!(!config.server_config().http2_enabled());
//! ```

#![doc(html_root_url = "https://docs.rs/gantry-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;

pub use config::{GantryConfig, ServerSection};
pub use error::ConfigError;
pub use loader::ConfigLoader;
