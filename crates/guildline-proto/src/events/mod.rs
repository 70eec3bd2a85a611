//! Typed gateway events.
//!
//! [`Event`] is a closed set: every tag in the default
//! [`EventRegistry`](crate::EventRegistry) maps to exactly one variant, and
//! anything else surfaces as [`Event::Unrecognized`]. Per-type capabilities
//! (a timestamp, a channel scope) are expressed with the [`Timestamped`] and
//! [`ChannelScoped`] traits rather than a class hierarchy.

mod message;
mod server;
mod welcome;

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::HashId;

pub use message::{Message, MessageDeleted, MessageDeletedEvent, MessageEvent, MessageType};
pub use server::{MemberRoles, RolesUpdatedEvent, Webhook, WebhookEvent, XpAddedEvent};
pub use welcome::{BotUser, WelcomeEvent};

/// An event with a creation or update time.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// An event that happened in a specific channel.
pub trait ChannelScoped {
    fn channel_id(&self) -> Uuid;

    /// Server the channel belongs to, absent for direct messages.
    fn server_id(&self) -> Option<&HashId>;
}

/// A decoded gateway event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Handshake completed.
    Welcome(WelcomeEvent),
    MessageCreated(MessageEvent),
    MessageUpdated(MessageEvent),
    MessageDeleted(MessageDeletedEvent),
    RolesUpdated(RolesUpdatedEvent),
    WebhookCreated(WebhookEvent),
    WebhookUpdated(WebhookEvent),
    XpAdded(XpAddedEvent),
    /// A tag with no registry entry. Never published to subscribers.
    Unrecognized {
        /// The raw wire tag.
        tag: String,
    },
}

/// Discriminant of [`Event`], used as a subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Welcome,
    MessageCreated,
    MessageUpdated,
    MessageDeleted,
    RolesUpdated,
    WebhookCreated,
    WebhookUpdated,
    XpAdded,
    Unrecognized,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 9] = [
        Self::Welcome,
        Self::MessageCreated,
        Self::MessageUpdated,
        Self::MessageDeleted,
        Self::RolesUpdated,
        Self::WebhookCreated,
        Self::WebhookUpdated,
        Self::XpAdded,
        Self::Unrecognized,
    ];

    /// Static label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::MessageCreated => "message_created",
            Self::MessageUpdated => "message_updated",
            Self::MessageDeleted => "message_deleted",
            Self::RolesUpdated => "roles_updated",
            Self::WebhookCreated => "webhook_created",
            Self::WebhookUpdated => "webhook_updated",
            Self::XpAdded => "xp_added",
            Self::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event {
    /// The discriminant of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Welcome(_) => EventKind::Welcome,
            Self::MessageCreated(_) => EventKind::MessageCreated,
            Self::MessageUpdated(_) => EventKind::MessageUpdated,
            Self::MessageDeleted(_) => EventKind::MessageDeleted,
            Self::RolesUpdated(_) => EventKind::RolesUpdated,
            Self::WebhookCreated(_) => EventKind::WebhookCreated,
            Self::WebhookUpdated(_) => EventKind::WebhookUpdated,
            Self::XpAdded(_) => EventKind::XpAdded,
            Self::Unrecognized { .. } => EventKind::Unrecognized,
        }
    }

    /// View this event through its timestamp capability, if it has one.
    pub fn as_timestamped(&self) -> Option<&dyn Timestamped> {
        match self {
            Self::MessageCreated(e) | Self::MessageUpdated(e) => Some(e as &dyn Timestamped),
            Self::MessageDeleted(e) => Some(e as &dyn Timestamped),
            Self::WebhookCreated(e) | Self::WebhookUpdated(e) => Some(e as &dyn Timestamped),
            _ => None,
        }
    }

    /// View this event through its channel capability, if it has one.
    pub fn as_channel_scoped(&self) -> Option<&dyn ChannelScoped> {
        match self {
            Self::MessageCreated(e) | Self::MessageUpdated(e) => Some(e as &dyn ChannelScoped),
            Self::MessageDeleted(e) => Some(e as &dyn ChannelScoped),
            Self::WebhookCreated(e) | Self::WebhookUpdated(e) => Some(e as &dyn ChannelScoped),
            _ => None,
        }
    }

    /// Server the event happened in, when the payload names one.
    pub fn server_id(&self) -> Option<&HashId> {
        match self {
            Self::RolesUpdated(e) => Some(&e.server_id),
            Self::XpAdded(e) => Some(&e.server_id),
            _ => self.as_channel_scoped().and_then(|e| e.server_id()),
        }
    }
}
