//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Gateway Defaults
// =============================================================================

pub fn default_gateway_url() -> String {
    "wss://www.guilded.gg/websocket/v1".to_string()
}

pub fn default_handshake_timeout_ms() -> u64 {
    10_000
}

/// Heartbeat interval used when the welcome frame does not announce one.
pub fn default_heartbeat_ms() -> u64 {
    22_500
}

// =============================================================================
// Reconnect Defaults
// =============================================================================

pub fn default_initial_backoff_ms() -> u64 {
    1_000
}

pub fn default_max_backoff_ms() -> u64 {
    60_000
}

// =============================================================================
// Command Defaults
// =============================================================================

pub fn default_separators() -> String {
    " \t\n".to_string()
}
