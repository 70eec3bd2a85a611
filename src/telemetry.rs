//! Telemetry utilities for command timing and tracing spans.

use std::time::Instant;

/// Guard for timing command execution and recording metrics.
///
/// Records command latency when dropped.
pub struct CommandTimer {
    command: String,
    start: Instant,
}

impl CommandTimer {
    /// Start timing a command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_command(&self.command, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Create a span for a gateway connection.
    pub fn connection(key: &str, url: &str) -> Span {
        let key = if key.is_empty() { "primary" } else { key };
        info_span!("connection", key = %key, url = %url)
    }

    /// Create a span for a command invocation.
    pub fn command(name: &str, author: &str, channel: &str) -> Span {
        info_span!("command", name = %name, author = %author, channel = %channel)
    }
}
