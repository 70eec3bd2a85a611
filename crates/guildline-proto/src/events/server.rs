//! Server-level payloads: role changes, webhooks and XP grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ChannelScoped, Timestamped};
use crate::HashId;

/// A member and the full list of roles they now hold.
///
/// The service does not say which roles were added or removed; callers that
/// need a diff must cache the previous list themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRoles {
    pub user_id: HashId,
    pub role_ids: Vec<u32>,
}

/// Payload of `TeamRolesUpdated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolesUpdatedEvent {
    /// Server where roles changed.
    pub server_id: HashId,
    /// Every member whose role list changed.
    pub member_role_ids: Vec<MemberRoles>,
}

impl RolesUpdatedEvent {
    /// Identifiers of the members whose roles changed.
    pub fn updated_users(&self) -> impl Iterator<Item = &HashId> {
        self.member_role_ids.iter().map(|m| &m.user_id)
    }
}

/// A channel webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub id: Uuid,
    pub name: String,
    pub server_id: HashId,
    pub channel_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub created_by: HashId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Only present for the webhook's creator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Payload of `TeamWebhookCreated` and `TeamWebhookUpdated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub server_id: HashId,
    pub webhook: Webhook,
}

impl Timestamped for WebhookEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.webhook.deleted_at.unwrap_or(self.webhook.created_at)
    }
}

impl ChannelScoped for WebhookEvent {
    fn channel_id(&self) -> Uuid {
        self.webhook.channel_id
    }

    fn server_id(&self) -> Option<&HashId> {
        Some(&self.server_id)
    }
}

/// Payload of `TeamXpAdded`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpAddedEvent {
    pub server_id: HashId,
    pub user_ids: Vec<HashId>,
    /// XP granted to each user; negative values remove XP.
    pub amount: i32,
}
