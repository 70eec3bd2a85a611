//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions and loading (Config, GatewayConfig, CommandsConfig)
//! - [`defaults`]: Default value functions referenced by serde
//! - [`validation`]: Startup validation collecting every problem at once

mod defaults;
mod types;
mod validation;

pub use types::{
    CommandsConfig, Config, ConfigError, GatewayConfig, LogFormat, LoggingConfig, MetricsConfig,
    ReconnectConfig,
};
pub use validation::{ValidationError, validate};
