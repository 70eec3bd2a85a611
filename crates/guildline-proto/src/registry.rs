//! Tag-to-deserializer table turning envelopes into typed [`Event`]s.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ProtocolError, Result};
use crate::events::Event;
use crate::frame::EventEnvelope;

/// Decodes one payload into a typed event.
pub type EventDeserializer =
    Arc<dyn Fn(&Value) -> std::result::Result<Event, serde_json::Error> + Send + Sync>;

/// Tag of the handshake frame.
pub const WELCOME_TAG: &str = "";

/// Tags known out of the box.
pub const DEFAULT_TAGS: [&str; 8] = [
    WELCOME_TAG,
    "ChatMessageCreated",
    "ChatMessageUpdated",
    "ChatMessageDeleted",
    "TeamRolesUpdated",
    "TeamWebhookCreated",
    "TeamWebhookUpdated",
    "TeamXpAdded",
];

/// Build a deserializer for payload type `T` wrapped by `wrap`.
pub fn typed<T>(wrap: fn(T) -> Event) -> EventDeserializer
where
    T: DeserializeOwned + 'static,
{
    Arc::new(move |payload: &Value| <T as Deserialize>::deserialize(payload).map(wrap))
}

/// Mapping from wire tag to payload deserializer.
#[derive(Clone)]
pub struct EventRegistry {
    entries: HashMap<String, EventDeserializer>,
}

impl EventRegistry {
    /// A registry with no entries: every tag is unrecognized.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// A registry populated with every event this crate models.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(WELCOME_TAG, typed(Event::Welcome));
        registry.register("ChatMessageCreated", typed(Event::MessageCreated));
        registry.register("ChatMessageUpdated", typed(Event::MessageUpdated));
        registry.register("ChatMessageDeleted", typed(Event::MessageDeleted));
        registry.register("TeamRolesUpdated", typed(Event::RolesUpdated));
        registry.register("TeamWebhookCreated", typed(Event::WebhookCreated));
        registry.register("TeamWebhookUpdated", typed(Event::WebhookUpdated));
        registry.register("TeamXpAdded", typed(Event::XpAdded));
        registry
    }

    /// Add or replace the deserializer for `tag`.
    pub fn register(&mut self, tag: impl Into<String>, deserializer: EventDeserializer) {
        self.entries.insert(tag.into(), deserializer);
    }

    /// Look up the deserializer for `tag`.
    pub fn resolve(&self, tag: &str) -> Option<EventDeserializer> {
        self.entries.get(tag).cloned()
    }

    /// Whether `tag` has an entry.
    pub fn contains(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    /// Number of registered tags.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no tags are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Turn an envelope into a typed event.
    ///
    /// Tags without an entry yield [`Event::Unrecognized`]; they are not
    /// errors.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::EventDecode`] when the tag is registered but
    /// the payload does not match its shape.
    pub fn materialize(&self, envelope: &EventEnvelope) -> Result<Event> {
        let Some(deserialize) = self.entries.get(&envelope.tag) else {
            return Ok(Event::Unrecognized {
                tag: envelope.tag.clone(),
            });
        };
        deserialize(&envelope.payload).map_err(|source| ProtocolError::EventDecode {
            tag: envelope.tag.clone(),
            source,
        })
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("EventRegistry").field("tags", &tags).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, XpAddedEvent};
    use crate::frame::decode_frame;
    use serde_json::json;

    fn message_payload() -> Value {
        json!({
            "serverId": "wlVr3Ggl",
            "message": {
                "id": "00000000-0000-0000-0000-000000000001",
                "channelId": "00000000-0000-0000-0000-0000000000aa",
                "content": "hello",
                "createdAt": "2021-06-15T20:15:00Z",
                "createdBy": "Ann6LewA"
            }
        })
    }

    #[test]
    fn defaults_cover_every_modelled_tag() {
        let registry = EventRegistry::with_defaults();
        for tag in DEFAULT_TAGS {
            assert!(registry.contains(tag), "missing {tag:?}");
        }
        assert_eq!(registry.len(), DEFAULT_TAGS.len());
    }

    #[test]
    fn materializes_registered_tag() {
        let registry = EventRegistry::with_defaults();
        let env = EventEnvelope::event("ChatMessageCreated", message_payload());

        let event = registry.materialize(&env).unwrap();
        assert_eq!(event.kind(), EventKind::MessageCreated);
        let Event::MessageCreated(created) = event else {
            unreachable!()
        };
        assert_eq!(created.message.text(), "hello");
    }

    #[test]
    fn welcome_frame_materializes_with_interval() {
        let registry = EventRegistry::with_defaults();
        let env = decode_frame(r#"{"op":1,"d":{"heartbeatIntervalMs":22500,"lastMessageId":"m1"}}"#)
            .unwrap();

        match registry.materialize(&env).unwrap() {
            Event::Welcome(welcome) => {
                assert_eq!(welcome.heartbeat_interval_ms, Some(22500));
                assert_eq!(welcome.last_message_id.as_deref(), Some("m1"));
            }
            other => panic!("expected welcome, got {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_unrecognized_not_error() {
        let registry = EventRegistry::with_defaults();
        let env = EventEnvelope::event("CalendarEventCreated", json!({"anything": true}));

        assert_eq!(
            registry.materialize(&env).unwrap(),
            Event::Unrecognized {
                tag: "CalendarEventCreated".to_string()
            }
        );
    }

    #[test]
    fn bad_payload_is_event_decode() {
        let registry = EventRegistry::with_defaults();
        let env = EventEnvelope::event("ChatMessageCreated", json!({"message": 5}));

        let err = registry.materialize(&env).unwrap_err();
        assert!(matches!(err, ProtocolError::EventDecode { ref tag, .. } if tag == "ChatMessageCreated"));
    }

    #[test]
    fn register_overrides_entry() {
        let mut registry = EventRegistry::empty();
        assert!(registry.resolve("TeamXpAdded").is_none());

        registry.register(
            "TeamXpAdded",
            Arc::new(|_: &Value| -> std::result::Result<Event, serde_json::Error> {
                Ok(Event::XpAdded(XpAddedEvent {
                    server_id: "wlVr3Ggl".parse().unwrap(),
                    user_ids: vec![],
                    amount: 1,
                }))
            }),
        );

        let env = EventEnvelope::event("TeamXpAdded", json!(null));
        assert_eq!(registry.materialize(&env).unwrap().kind(), EventKind::XpAdded);
    }
}
