//! Wire frame builders.

#![allow(dead_code)]

use guildline::proto::{Event, EventEnvelope, MessageEvent, encode_frame};
use serde_json::{Value, json};

pub const CHANNEL_ID: &str = "00000000-0000-0000-0000-0000000000aa";
pub const AUTHOR_ID: &str = "Ann6LewA";
pub const SERVER_ID: &str = "wlVr3Ggl";

pub fn welcome(heartbeat_ms: u64) -> String {
    encode_frame(&EventEnvelope::welcome(heartbeat_ms))
}

fn event(tag: &str, payload: Value, message_id: Option<&str>) -> String {
    let mut envelope = EventEnvelope::event(tag, payload);
    if let Some(id) = message_id {
        envelope = envelope.with_message_id(id);
    }
    encode_frame(&envelope)
}

/// `ChatMessageCreated` payload with the given content.
pub fn message_payload(content: &str) -> Value {
    json!({
        "serverId": SERVER_ID,
        "message": {
            "id": "00000000-0000-0000-0000-000000000001",
            "type": "default",
            "serverId": SERVER_ID,
            "channelId": CHANNEL_ID,
            "content": content,
            "createdAt": "2021-06-15T20:15:00Z",
            "createdBy": AUTHOR_ID
        }
    })
}

pub fn message_created(content: &str, message_id: Option<&str>) -> String {
    event("ChatMessageCreated", message_payload(content), message_id)
}

pub fn xp_added(amount: i32, message_id: Option<&str>) -> String {
    event(
        "TeamXpAdded",
        json!({ "serverId": SERVER_ID, "userIds": [AUTHOR_ID], "amount": amount }),
        message_id,
    )
}

pub fn unknown(tag: &str) -> String {
    event(tag, json!({ "whatever": 1 }), None)
}

/// A registered tag whose payload does not match its shape.
pub fn undecodable() -> String {
    event("ChatMessageCreated", json!({ "message": 5 }), None)
}

/// An in-process `MessageCreated` event, for publishing without a socket.
pub fn message_event(content: &str) -> Event {
    let event: MessageEvent =
        serde_json::from_value(message_payload(content)).expect("valid message payload");
    Event::MessageCreated(event)
}
