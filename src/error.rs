//! Unified error handling for guildline.
//!
//! Each layer has its own error enum so callers can tell recoverable
//! per-frame or per-invocation failures apart from fatal setup mistakes.
//! Every enum exposes `error_code()` for metric labels.

use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::commands::ArgType;

pub use guildline_proto::ProtocolError;

// ============================================================================
// Connection Errors (gateway lifecycle)
// ============================================================================

/// Errors raised while opening, running or closing a gateway connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("websocket transport error: {0}")]
    Transport(#[source] Box<tungstenite::Error>),

    #[error("no welcome frame within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("connection closed before the welcome frame arrived")]
    HandshakeClosed,

    #[error("invalid welcome frame: {0}")]
    InvalidHandshake(String),

    #[error("invalid connection request: {0}")]
    InvalidRequest(String),

    #[error("connection {0:?} is already open")]
    AlreadyConnected(String),

    #[error("no open connection {0:?}")]
    NotConnected(String),
}

impl ConnectionError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::HandshakeTimeout(_) => "handshake_timeout",
            Self::HandshakeClosed => "handshake_closed",
            Self::InvalidHandshake(_) => "invalid_handshake",
            Self::InvalidRequest(_) => "invalid_request",
            Self::AlreadyConnected(_) => "already_connected",
            Self::NotConnected(_) => "not_connected",
        }
    }
}

impl From<tungstenite::Error> for ConnectionError {
    fn from(err: tungstenite::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

// ============================================================================
// Registration Errors (startup)
// ============================================================================

/// Errors returned when building a command registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("command name or alias {name:?} is already taken")]
    DuplicateCommandName { name: String },

    #[error("parameter {parameter:?} of command {command:?} has type {ty} with no converter")]
    UnsupportedParameterType {
        command: String,
        parameter: String,
        ty: ArgType,
    },

    #[error("rest parameter {parameter:?} of command {command:?} must be the last parameter")]
    MisplacedRestParameter { command: String, parameter: String },
}

impl RegistrationError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateCommandName { .. } => "duplicate_command_name",
            Self::UnsupportedParameterType { .. } => "unsupported_parameter_type",
            Self::MisplacedRestParameter { .. } => "misplaced_rest_parameter",
        }
    }
}

// ============================================================================
// Binding Errors (per invocation)
// ============================================================================

/// Errors produced while binding argument tokens to parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("missing required argument {parameter:?} at position {position}")]
    MissingArgument { parameter: String, position: usize },

    #[error("argument {parameter:?}: cannot read {token:?} as {ty}: {reason}")]
    ArgumentFormatError {
        parameter: String,
        token: String,
        ty: ArgType,
        reason: String,
    },
}

impl BindingError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingArgument { .. } => "missing_argument",
            Self::ArgumentFormatError { .. } => "argument_format",
        }
    }
}

/// Errors from reading a bound argument with the wrong accessor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("no argument at index {0}")]
    OutOfRange(usize),

    #[error("argument {0} was not supplied")]
    Missing(usize),

    #[error("argument {index} is {found}, not {expected}")]
    TypeMismatch {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
}

// ============================================================================
// Configuration Errors (module attach/detach)
// ============================================================================

/// Misuse of the command module attach/detach lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("command module is already attached to this event bus")]
    AlreadyAttached,

    #[error("command module is not attached")]
    NotAttached,

    #[error("attach handle does not match the current attachment")]
    HandleMismatch,
}

impl ConfigurationError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyAttached => "already_attached",
            Self::NotAttached => "not_attached",
            Self::HandleMismatch => "handle_mismatch",
        }
    }
}

// ============================================================================
// REST Errors (collaborator seam)
// ============================================================================

/// Errors from the REST collaborator.
#[derive(Debug, Error)]
pub enum RestError {
    #[error("no REST client configured")]
    Unavailable,

    #[error("request failed: {0}")]
    Request(String),

    #[error("response has no {0:?} field")]
    MissingField(String),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RestError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Request(_) => "request",
            Self::MissingField(_) => "missing_field",
            Self::Decode(_) => "decode",
        }
    }
}
