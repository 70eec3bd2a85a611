//! Gateway frame codec.
//!
//! Every inbound websocket message is a JSON object:
//!
//! ```text
//! { "op": 0, "t": "ChatMessageCreated", "d": { ... }, "s": "a8b0c1..." }
//! ```
//!
//! - `op`: opcode (small unsigned integer), required
//! - `t`: event tag, absent or empty for the welcome handshake
//! - `d`: payload, absent means an empty object
//! - `s`: wire message id, used to resume after a reconnect

use serde_json::{Map, Value};

use crate::error::{ProtocolError, Result};

/// Payload key carrying the negotiated heartbeat interval on the welcome frame.
pub const HEARTBEAT_INTERVAL_FIELD: &str = "heartbeatIntervalMs";

/// Payload key carrying the last wire message id on the welcome frame.
pub const LAST_MESSAGE_ID_FIELD: &str = "lastMessageId";

/// Frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// A regular dispatched event.
    Event,
    /// Handshake frame sent right after the socket opens.
    Welcome,
    /// Replay of missed events has finished.
    Resumed,
    /// The server rejected something we sent.
    Error,
    /// The resume cursor is no longer valid; replay is impossible.
    InvalidCursor,
    /// Any opcode this client does not know about.
    Other(u8),
}

impl Opcode {
    /// Map a wire integer to an opcode.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Event,
            1 => Self::Welcome,
            2 => Self::Resumed,
            8 => Self::Error,
            9 => Self::InvalidCursor,
            other => Self::Other(other),
        }
    }

    /// Map an opcode back to its wire integer.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Event => 0,
            Self::Welcome => 1,
            Self::Resumed => 2,
            Self::Error => 8,
            Self::InvalidCursor => 9,
            Self::Other(other) => other,
        }
    }
}

/// A decoded but not yet typed gateway message.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    /// Event tag, empty for the welcome handshake.
    pub tag: String,
    /// Frame opcode.
    pub opcode: Opcode,
    /// Raw payload.
    pub payload: Value,
    /// Wire message id, if the server sent one.
    pub message_id: Option<String>,
}

impl EventEnvelope {
    /// Build an envelope for a regular event.
    pub fn event(tag: impl Into<String>, payload: Value) -> Self {
        Self {
            tag: tag.into(),
            opcode: Opcode::Event,
            payload,
            message_id: None,
        }
    }

    /// Build a welcome envelope announcing the given heartbeat interval.
    pub fn welcome(heartbeat_interval_ms: u64) -> Self {
        let mut payload = Map::new();
        payload.insert(
            HEARTBEAT_INTERVAL_FIELD.to_string(),
            Value::from(heartbeat_interval_ms),
        );
        Self {
            tag: String::new(),
            opcode: Opcode::Welcome,
            payload: Value::Object(payload),
            message_id: None,
        }
    }

    /// Attach a wire message id.
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Whether this is the welcome/handshake frame.
    pub fn is_welcome(&self) -> bool {
        self.tag.is_empty()
            && (self.opcode == Opcode::Welcome
                || self.payload.get(HEARTBEAT_INTERVAL_FIELD).is_some())
    }

    /// Heartbeat interval announced by a welcome frame, in milliseconds.
    pub fn heartbeat_interval(&self) -> Option<u64> {
        if !self.is_welcome() {
            return None;
        }
        self.payload
            .get(HEARTBEAT_INTERVAL_FIELD)
            .and_then(Value::as_u64)
            .filter(|ms| *ms > 0)
    }
}

/// Decode one raw inbound message into an [`EventEnvelope`].
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedFrame`] if the text is not a JSON
/// object or the routing fields are missing or mistyped.
pub fn decode_frame(raw: &str) -> Result<EventEnvelope> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ProtocolError::malformed(format!("invalid JSON: {e}")))?;

    let Value::Object(mut fields) = value else {
        return Err(ProtocolError::malformed("frame is not a JSON object"));
    };

    let opcode = match fields.get("op") {
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|op| u8::try_from(op).ok())
            .map(Opcode::from_u8)
            .ok_or_else(|| ProtocolError::malformed(format!("opcode out of range: {n}")))?,
        Some(other) => {
            return Err(ProtocolError::malformed(format!(
                "opcode is not an integer: {other}"
            )))
        }
        None => return Err(ProtocolError::malformed("missing field `op`")),
    };

    let tag = match fields.remove("t") {
        Some(Value::String(tag)) => tag,
        Some(Value::Null) | None => String::new(),
        Some(other) => {
            return Err(ProtocolError::malformed(format!(
                "event tag is not a string: {other}"
            )))
        }
    };

    let message_id = match fields.remove("s") {
        Some(Value::String(id)) if !id.is_empty() => Some(id),
        _ => None,
    };

    let payload = match fields.remove("d") {
        Some(Value::Null) | None => Value::Object(Map::new()),
        Some(payload) => payload,
    };

    Ok(EventEnvelope {
        tag,
        opcode,
        payload,
        message_id,
    })
}

/// Encode an envelope back into its wire text.
pub fn encode_frame(envelope: &EventEnvelope) -> String {
    let mut fields = Map::new();
    fields.insert("op".to_string(), Value::from(envelope.opcode.as_u8()));
    if !envelope.tag.is_empty() {
        fields.insert("t".to_string(), Value::String(envelope.tag.clone()));
    }
    fields.insert("d".to_string(), envelope.payload.clone());
    if let Some(id) = &envelope.message_id {
        fields.insert("s".to_string(), Value::String(id.clone()));
    }
    Value::Object(fields).to_string()
}
