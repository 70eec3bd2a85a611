//! Error types for the gateway protocol library.
//!
//! Both variants are per-frame failures: callers drop the offending frame
//! and keep the connection running.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The frame was not a well-formed JSON document, or a routing field
    /// (`op`, `t`) was absent or had the wrong shape.
    #[error("malformed frame: {reason}")]
    MalformedFrame {
        /// Human-readable description of what was wrong.
        reason: String,
    },

    /// The tag is registered but its payload did not match the expected shape.
    #[error("failed to decode {tag:?} event: {source}")]
    EventDecode {
        /// The event tag whose payload failed to decode.
        tag: String,
        /// The underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },
}

impl ProtocolError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            reason: reason.into(),
        }
    }

    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedFrame { .. } => "malformed_frame",
            Self::EventDecode { .. } => "event_decode",
        }
    }
}

/// Error returned when a string is not a valid [`crate::HashId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hash identifier {0:?}: expected 8 ASCII letters or digits")]
pub struct InvalidHashId(pub String);
