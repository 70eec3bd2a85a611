//! Chat message payloads (`ChatMessageCreated`, `ChatMessageUpdated`,
//! `ChatMessageDeleted`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ChannelScoped, Timestamped};
use crate::HashId;

/// Whether a message was posted by a user/bot or generated by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Regular message.
    #[default]
    Default,
    /// Service-generated message (joins, pins, ...).
    System,
}

/// A message posted in a chat channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message identifier.
    pub id: Uuid,
    /// Default or system message.
    #[serde(rename = "type", default)]
    pub kind: MessageType,
    /// Server the message was posted in, absent for direct messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<HashId>,
    /// Channel the message was posted in.
    pub channel_id: Uuid,
    /// Markdown content. Absent for embed-only messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Messages this one replies to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reply_message_ids: Vec<Uuid>,
    /// Reply visible only to the mentioned users.
    #[serde(default)]
    pub is_private: bool,
    /// Posted without notifying mentioned users.
    #[serde(default)]
    pub is_silent: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Author.
    pub created_by: HashId,
    /// Webhook that posted the message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_webhook_id: Option<Uuid>,
    /// Last edit time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Whether the message replies to at least one other message.
    pub fn is_reply(&self) -> bool {
        !self.reply_message_ids.is_empty()
    }

    /// Content as a string slice, empty when absent.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// Payload of `ChatMessageCreated` and `ChatMessageUpdated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    /// Server where it happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<HashId>,
    /// The created or updated message.
    pub message: Message,
}

impl Timestamped for MessageEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.message.updated_at.unwrap_or(self.message.created_at)
    }
}

impl ChannelScoped for MessageEvent {
    fn channel_id(&self) -> Uuid {
        self.message.channel_id
    }

    fn server_id(&self) -> Option<&HashId> {
        self.server_id.as_ref().or(self.message.server_id.as_ref())
    }
}

/// Minimal information about a deleted message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeleted {
    /// Message identifier.
    pub id: Uuid,
    /// Channel the message was in.
    pub channel_id: Uuid,
    /// Server the message was in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<HashId>,
    /// Deletion time.
    pub deleted_at: DateTime<Utc>,
    /// Whether the deleted message was a private reply.
    #[serde(default)]
    pub is_private: bool,
}

/// Payload of `ChatMessageDeleted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeletedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<HashId>,
    pub message: MessageDeleted,
}

impl Timestamped for MessageDeletedEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.message.deleted_at
    }
}

impl ChannelScoped for MessageDeletedEvent {
    fn channel_id(&self) -> Uuid {
        self.message.channel_id
    }

    fn server_id(&self) -> Option<&HashId> {
        self.server_id.as_ref().or(self.message.server_id.as_ref())
    }
}
