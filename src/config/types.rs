//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::defaults::*;
use super::validation::{ValidationError, validate};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Invalid(Vec<ValidationError>),
}

/// Bot configuration.
///
/// Every section is optional; an empty file yields a configuration that
/// connects to the public gateway without a token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Gateway connection settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Command dispatcher settings.
    #[serde(default)]
    pub commands: CommandsConfig,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Prometheus endpoint settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text and validate it.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        validate(&config).map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}

/// Gateway connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Websocket endpoint (`ws://` or `wss://`).
    #[serde(default = "default_gateway_url")]
    pub url: String,
    /// Bearer token sent as the `Authorization` header, passed through verbatim.
    #[serde(default)]
    pub token: Option<String>,
    /// Time allowed for connecting and receiving the welcome frame.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Heartbeat interval used when the welcome frame omits one.
    #[serde(default = "default_heartbeat_ms")]
    pub default_heartbeat_ms: u64,
    /// Reconnect policy after a fault.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            token: None,
            handshake_timeout_ms: default_handshake_timeout_ms(),
            default_heartbeat_ms: default_heartbeat_ms(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Configuration pointing at `url` with every other field defaulted.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Reconnect policy: exponential backoff with jitter.
///
/// The delay before attempt `n` is `initial_backoff_ms * 2^(n-1)`, capped at
/// `max_backoff_ms`, with up to half of it replaced by random jitter.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    /// Reconnect automatically after a fault (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay before the first attempt (default: 1000).
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay (default: 60000).
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Give up after this many consecutive failed attempts. Unset means never.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_attempts: None,
        }
    }
}

/// Command dispatcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandsConfig {
    /// Literal prefix a message must start with (default: empty).
    #[serde(default)]
    pub prefix: String,
    /// Characters splitting the command line into tokens.
    #[serde(default = "default_separators")]
    pub separators: String,
    /// Drop empty tokens produced by consecutive separators.
    #[serde(default = "default_true")]
    pub discard_empty: bool,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            separators: default_separators(),
            discard_empty: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    /// Port for the `/metrics` endpoint. Unset or 0 disables it.
    #[serde(default)]
    pub port: Option<u16>,
}

impl MetricsConfig {
    /// The port to serve on, if metrics are enabled.
    pub fn enabled_port(&self) -> Option<u16> {
        self.port.filter(|port| *port != 0)
    }
}
