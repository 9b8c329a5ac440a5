//! Layered configuration loading.
//!
//! Layers apply in order, each overriding only the keys it sets:
//!
//! 1. Defaults (or a preset)
//! 2. Files or strings in TOML or JSON, in the order added
//! 3. Environment variables `PREFIX__SECTION__KEY`

use std::env;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::{ConfigError, GantryConfig};

/// Configuration loader.
///
/// # Example
///
/// ```no_run
/// use gantry_config::ConfigLoader;
///
/// # fn main() -> Result<(), gantry_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("gantry.toml")?
///     .with_env_prefix("GANTRY")
///     .load()?;
/// let server = config.server_config();
/// # let _ = server;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    base: GantryConfig,
    layers: Vec<Value>,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: GantryConfig::default(),
            layers: Vec::new(),
            env_prefix: None,
        }
    }

    /// Starts from the development preset.
    ///
    /// ```
    /// use gantry_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.base = GantryConfig::development();
        self
    }

    /// Starts from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.base = GantryConfig::production();
        self
    }

    /// Adds a file layer. The format follows the extension (`.toml` or
    /// `.json`).
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        self.layers.push(parse(&content, format)?);
        Ok(self)
    }

    /// Adds a file layer if the file exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Adds a layer from a string in `format` (`"toml"` or `"json"`).
    ///
    /// ```
    /// use gantry_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[server]\nmax_body_size = 1024\n", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.server.max_body_size, 1024);
    /// assert_eq!(config.server.http_addrs, ["0.0.0.0:8080"]);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.layers.push(parse(content, format)?);
        Ok(self)
    }

    /// Enables environment overrides named `PREFIX__SECTION__KEY`, for
    /// example `GANTRY__SERVER__HTTP_ADDRS=127.0.0.1:80,127.0.0.1:81`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Merges every layer, applies the environment and validates.
    pub fn load(self) -> Result<GantryConfig, ConfigError> {
        let vars: Vec<(String, String)> = match &self.env_prefix {
            Some(prefix) => env::vars().filter(|(k, _)| k.starts_with(prefix.as_str())).collect(),
            None => Vec::new(),
        };
        self.load_with_vars(vars)
    }

    /// Like [`load`](Self::load), with an explicit variable set instead of
    /// the process environment.
    pub fn load_with_vars<I>(self, vars: I) -> Result<GantryConfig, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut merged = serde_json::to_value(&self.base)?;
        for layer in self.layers {
            merge(&mut merged, layer);
        }
        let mut config: GantryConfig = serde_json::from_value(merged)?;

        if let Some(prefix) = &self.env_prefix {
            for (key, value) in vars {
                if let Some(path) = key
                    .strip_prefix(prefix.as_str())
                    .and_then(|rest| rest.strip_prefix("__"))
                {
                    apply_env_var(&mut config, &key, path, &value)?;
                }
            }
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse(content: &str, format: &str) -> Result<Value, ConfigError> {
    let value = match format.to_ascii_lowercase().as_str() {
        "toml" => serde_json::to_value(toml::from_str::<toml::Table>(content)?)?,
        "json" => serde_json::from_str(content)?,
        other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
    };
    Ok(value)
}

/// Deep-merges `layer` into `base`; tables merge key by key, anything else
/// replaces.
fn merge(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => merge_maps(base, layer),
        (base, layer) => *base = layer,
    }
}

fn merge_maps(base: &mut Map<String, Value>, layer: Map<String, Value>) {
    for (key, value) in layer {
        match base.get_mut(&key) {
            Some(existing) => merge(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}

fn apply_env_var(
    config: &mut GantryConfig,
    var: &str,
    path: &str,
    value: &str,
) -> Result<(), ConfigError> {
    let parts: Vec<&str> = path.split("__").collect();
    let server = &mut config.server;
    let logging = &mut config.logging;

    match parts.as_slice() {
        ["SERVER", "HTTP_ADDRS" | "HTTP_ADDR"] => {
            server.http_addrs = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
            server.shutdown_timeout_secs = parse_number(var, value)?;
        }
        ["SERVER", "REQUEST_TIMEOUT_SECS"] => {
            server.request_timeout_secs = parse_number(var, value)?;
        }
        ["SERVER", "MAX_BODY_SIZE"] => server.max_body_size = parse_number(var, value)?,
        ["SERVER", "HTTP2_ENABLED"] => server.http2_enabled = parse_flag(var, value)?,

        ["LOGGING", "ENABLED"] => logging.enabled = parse_flag(var, value)?,
        ["LOGGING", "LEVEL"] => logging.level = value.to_string(),
        ["LOGGING", "JSON_FORMAT"] => logging.json_format = parse_flag(var, value)?,
        ["LOGGING", "SPAN_EVENTS"] => logging.span_events = parse_flag(var, value)?,
        ["LOGGING", "FILE_LINE_INFO"] => logging.file_line_info = parse_flag(var, value)?,
        ["LOGGING", "THREAD_IDS"] => logging.thread_ids = parse_flag(var, value)?,
        ["LOGGING", "INCLUDE_TARGET"] => logging.include_target = parse_flag(var, value)?,

        _ => return Err(ConfigError::env_parse(var, "unknown configuration key")),
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(var, "expected a non-negative integer"))
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_parse(var, "expected boolean")),
    }
}
