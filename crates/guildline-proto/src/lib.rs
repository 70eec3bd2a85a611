//! # guildline-proto
//!
//! Wire-level types for the Guildline bot runtime: the gateway frame codec,
//! short-hash identifiers, typed domain events and the tag registry that
//! connects them. Nothing here performs I/O or depends on an async runtime.
//!
//! ## Decoding a frame
//!
//! ```rust
//! use guildline_proto::{decode_frame, Event, EventRegistry};
//!
//! let registry = EventRegistry::with_defaults();
//! let envelope = decode_frame(r#"{"op":1,"d":{"heartbeatIntervalMs":22500}}"#).unwrap();
//! assert_eq!(envelope.heartbeat_interval(), Some(22500));
//!
//! match registry.materialize(&envelope).unwrap() {
//!     Event::Welcome(welcome) => assert_eq!(welcome.heartbeat_interval_ms, Some(22500)),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```
//!
//! Unknown tags are not errors:
//!
//! ```rust
//! use guildline_proto::{decode_frame, Event, EventRegistry};
//!
//! let envelope = decode_frame(r#"{"op":0,"t":"SomethingNew","d":{}}"#).unwrap();
//! let event = EventRegistry::with_defaults().materialize(&envelope).unwrap();
//! assert!(matches!(event, Event::Unrecognized { .. }));
//! ```

#![deny(clippy::all)]

pub mod error;
pub mod events;
pub mod frame;
pub mod id;
pub mod registry;

pub use self::error::{InvalidHashId, ProtocolError, Result};
pub use self::events::{
    BotUser, ChannelScoped, Event, EventKind, MemberRoles, Message, MessageDeleted,
    MessageDeletedEvent, MessageEvent, MessageType, RolesUpdatedEvent, Timestamped, Webhook,
    WebhookEvent, WelcomeEvent, XpAddedEvent,
};
pub use self::frame::{decode_frame, encode_frame, EventEnvelope, Opcode};
pub use self::id::{HashId, HASH_ID_LEN};
pub use self::registry::{EventDeserializer, EventRegistry, DEFAULT_TAGS, WELCOME_TAG};
