//! Invocation context handed to command handlers.

use std::sync::Arc;

use guildline_proto::{HashId, Message, MessageEvent};
use uuid::Uuid;

use crate::error::RestError;
use crate::rest::{
    MessageOptions, Reaction, RestClient, add_reaction_request, create_message_request,
    delete_message_request, fetch_object, remove_reaction_request, update_message_request,
};

/// Everything a handler knows about the message that triggered it.
#[derive(Clone)]
pub struct CommandContext {
    event: Arc<MessageEvent>,
    /// Prefix the message started with.
    pub prefix: String,
    /// Command name as typed (may be an alias).
    pub command: String,
    /// Raw argument tokens after the command name.
    pub args: Vec<String>,
    rest: Option<Arc<dyn RestClient>>,
}

impl CommandContext {
    pub fn new(
        event: Arc<MessageEvent>,
        prefix: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
        rest: Option<Arc<dyn RestClient>>,
    ) -> Self {
        Self {
            event,
            prefix: prefix.into(),
            command: command.into(),
            args,
            rest,
        }
    }

    pub fn event(&self) -> &MessageEvent {
        &self.event
    }

    pub fn message(&self) -> &Message {
        &self.event.message
    }

    pub fn channel_id(&self) -> Uuid {
        self.event.message.channel_id
    }

    pub fn server_id(&self) -> Option<&HashId> {
        self.event
            .server_id
            .as_ref()
            .or(self.event.message.server_id.as_ref())
    }

    pub fn author(&self) -> &HashId {
        &self.event.message.created_by
    }

    /// Post `content` in the same channel as a reply to the triggering message.
    pub async fn reply(&self, content: &str) -> Result<Message, RestError> {
        self.create_message_with(content, MessageOptions::reply_to(self.event.message.id))
            .await
    }

    /// Post `content` in the same channel.
    pub async fn create_message(&self, content: &str) -> Result<Message, RestError> {
        self.create_message_with(content, MessageOptions::default()).await
    }

    /// Post `content` in the same channel with explicit flags and replies.
    pub async fn create_message_with(
        &self,
        content: &str,
        options: MessageOptions,
    ) -> Result<Message, RestError> {
        let request = create_message_request(self.channel_id(), content, &options);
        fetch_object(self.client()?, request, "message").await
    }

    /// Replace the content of the triggering message.
    pub async fn update(&self, content: &str) -> Result<Message, RestError> {
        let request = update_message_request(self.channel_id(), self.event.message.id, content);
        fetch_object(self.client()?, request, "message").await
    }

    /// Delete the triggering message.
    pub async fn delete(&self) -> Result<(), RestError> {
        let request = delete_message_request(self.channel_id(), self.event.message.id);
        self.client()?.execute(request).await.map(drop)
    }

    /// React to the triggering message with `emote_id`.
    pub async fn add_reaction(&self, emote_id: u32) -> Result<Reaction, RestError> {
        let request = add_reaction_request(self.channel_id(), self.event.message.id, emote_id);
        fetch_object(self.client()?, request, "emote").await
    }

    /// Remove this bot's `emote_id` reaction from the triggering message.
    pub async fn remove_reaction(&self, emote_id: u32) -> Result<(), RestError> {
        let request = remove_reaction_request(self.channel_id(), self.event.message.id, emote_id);
        self.client()?.execute(request).await.map(drop)
    }

    fn client(&self) -> Result<&dyn RestClient, RestError> {
        self.rest.as_deref().ok_or(RestError::Unavailable)
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("message_id", &self.event.message.id)
            .field("command", &self.command)
            .field("args", &self.args)
            .field("has_rest_client", &self.rest.is_some())
            .finish()
    }
}
