//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("gateway.url must start with ws:// or wss://, got '{0}'")]
    InvalidGatewayUrl(String),
    #[error("gateway.token is set but empty")]
    EmptyToken,
    #[error("gateway.handshake_timeout_ms must be greater than 0")]
    ZeroHandshakeTimeout,
    #[error("gateway.default_heartbeat_ms must be greater than 0")]
    ZeroHeartbeat,
    #[error("gateway.reconnect.initial_backoff_ms must be greater than 0")]
    ZeroBackoff,
    #[error("gateway.reconnect.initial_backoff_ms ({initial}) exceeds max_backoff_ms ({max})")]
    BackoffRange { initial: u64, max: u64 },
    #[error("gateway.reconnect.max_attempts must be greater than 0 when set")]
    ZeroMaxAttempts,
    #[error("commands.separators must contain at least one character")]
    EmptySeparators,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let gateway = &config.gateway;

    if !(gateway.url.starts_with("ws://") || gateway.url.starts_with("wss://")) {
        errors.push(ValidationError::InvalidGatewayUrl(gateway.url.clone()));
    }
    if gateway.token.as_deref().is_some_and(str::is_empty) {
        errors.push(ValidationError::EmptyToken);
    }
    if gateway.handshake_timeout_ms == 0 {
        errors.push(ValidationError::ZeroHandshakeTimeout);
    }
    if gateway.default_heartbeat_ms == 0 {
        errors.push(ValidationError::ZeroHeartbeat);
    }

    // Reconnect policy
    let reconnect = &gateway.reconnect;
    if reconnect.initial_backoff_ms == 0 {
        errors.push(ValidationError::ZeroBackoff);
    } else if reconnect.initial_backoff_ms > reconnect.max_backoff_ms {
        errors.push(ValidationError::BackoffRange {
            initial: reconnect.initial_backoff_ms,
            max: reconnect.max_backoff_ms,
        });
    }
    if reconnect.max_attempts == Some(0) {
        errors.push(ValidationError::ZeroMaxAttempts);
    }

    if config.commands.separators.is_empty() {
        errors.push(ValidationError::EmptySeparators);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
