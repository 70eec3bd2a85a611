//! Prometheus metrics collection for guildline.
//!
//! Tracks gateway throughput, dropped frames, reconnects and command
//! execution. Exposed over HTTP by [`crate::http`] when enabled.
//!
//! - `guildline_frames_received_total` - Raw frames read from any connection
//! - `guildline_events_published_total{kind}` - Typed events handed to the bus
//! - `guildline_frames_dropped_total{reason}` - Frames that produced no event
//! - `guildline_command_duration_seconds{command}` - Command latency histogram

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Gateway Metrics
// ========================================================================

/// Total frames received across all connections.
pub static FRAMES_RECEIVED: OnceLock<IntCounter> = OnceLock::new();

/// Typed events published to the bus, by kind.
pub static EVENTS_PUBLISHED: OnceLock<IntCounterVec> = OnceLock::new();

/// Frames dropped without publishing, by reason.
pub static FRAMES_DROPPED: OnceLock<IntCounterVec> = OnceLock::new();

/// Reconnect attempts started.
pub static RECONNECT_ATTEMPTS: OnceLock<IntCounter> = OnceLock::new();

/// Currently open gateway connections.
pub static OPEN_CONNECTIONS: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Command Metrics
// ========================================================================

/// Commands invoked by name.
pub static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Command latency by name.
pub static COMMAND_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Command errors by name and error kind.
pub static COMMAND_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before metrics are recorded; until then
/// every recording helper is a no-op.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::error!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(FRAMES_RECEIVED, IntCounter::new("guildline_frames_received_total", "Frames received from the gateway"));
    register!(EVENTS_PUBLISHED, IntCounterVec::new(Opts::new("guildline_events_published_total", "Typed events published by kind"), &["kind"]));
    register!(FRAMES_DROPPED, IntCounterVec::new(Opts::new("guildline_frames_dropped_total", "Frames dropped by reason"), &["reason"]));
    register!(RECONNECT_ATTEMPTS, IntCounter::new("guildline_reconnect_attempts_total", "Reconnect attempts started"));
    register!(OPEN_CONNECTIONS, IntGauge::new("guildline_open_connections", "Open gateway connections"));

    register!(COMMAND_COUNTER, IntCounterVec::new(Opts::new("guildline_command_total", "Commands invoked by name"), &["command"]));
    register!(COMMAND_LATENCY, HistogramVec::new(
        HistogramOpts::new("guildline_command_duration_seconds", "Command latency by name")
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["command"]));
    register!(COMMAND_ERRORS, IntCounterVec::new(Opts::new("guildline_command_errors_total", "Command errors by name and kind"), &["command", "error"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Recording helpers
// ============================================================================

/// Record one inbound frame.
#[inline]
pub fn record_frame() {
    if let Some(c) = FRAMES_RECEIVED.get() {
        c.inc();
    }
}

/// Record a published event.
#[inline]
pub fn record_event(kind: &str) {
    if let Some(c) = EVENTS_PUBLISHED.get() {
        c.with_label_values(&[kind]).inc();
    }
}

/// Record a frame that produced no event.
#[inline]
pub fn record_dropped(reason: &str) {
    if let Some(c) = FRAMES_DROPPED.get() {
        c.with_label_values(&[reason]).inc();
    }
}

/// Record the start of a reconnect attempt.
#[inline]
pub fn record_reconnect() {
    if let Some(c) = RECONNECT_ATTEMPTS.get() {
        c.inc();
    }
}

/// Adjust the open connection gauge.
#[inline]
pub fn add_open_connections(delta: i64) {
    if let Some(g) = OPEN_CONNECTIONS.get() {
        g.add(delta);
    }
}

/// Record a command execution with latency.
#[inline]
pub fn record_command(command: &str, duration_secs: f64) {
    if let Some(c) = COMMAND_COUNTER.get() {
        c.with_label_values(&[command]).inc();
    }
    if let Some(h) = COMMAND_LATENCY.get() {
        h.with_label_values(&[command]).observe(duration_secs);
    }
}

/// Record a command error.
#[inline]
pub fn record_command_error(command: &str, error: &str) {
    if let Some(c) = COMMAND_ERRORS.get() {
        c.with_label_values(&[command, error]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_lifecycle() {
        init();

        record_frame();
        record_event("message_created");
        record_dropped("malformed_frame");
        record_command("TEST", 0.001);
        record_command_error("TEST", "missing_argument");

        let output = gather_metrics();
        assert!(output.contains("guildline_command_total"));
        assert!(output.contains("guildline_frames_dropped_total"));
    }
}
