//! REST collaborator seam.
//!
//! The runtime never talks HTTP itself; a [`RestClient`] supplied by the
//! application executes requests and hands back the JSON body.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::RestError;

/// HTTP method of a REST request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// A request relative to the API base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: Method,
    /// Path without a leading slash, e.g. `channels/{id}/messages`.
    pub path: String,
    pub body: Option<Value>,
}

impl RestRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Executes REST requests on behalf of the runtime.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Send `request` and return the decoded JSON response body.
    async fn execute(&self, request: RestRequest) -> Result<Value, RestError>;
}

/// Execute `request` and deserialize the `key` field of the response.
pub async fn fetch_object<T: DeserializeOwned>(
    client: &dyn RestClient,
    request: RestRequest,
    key: &str,
) -> Result<T, RestError> {
    let mut response = client.execute(request).await?;
    let object = response
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| RestError::MissingField(key.to_string()))?;
    Ok(serde_json::from_value(object)?)
}

/// Flags for a new message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageOptions {
    /// Only visible to the mentioned users and the replied-to authors.
    pub is_private: bool,
    /// Do not notify mentioned users.
    pub is_silent: bool,
    pub reply_to: Vec<Uuid>,
}

impl MessageOptions {
    pub fn reply_to(id: Uuid) -> Self {
        Self {
            reply_to: vec![id],
            ..Self::default()
        }
    }
}

/// An emote reaction on a message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// `POST channels/{channel_id}/messages`.
///
/// Flags and reply ids are only sent when set.
pub fn create_message_request(channel_id: Uuid, content: &str, options: &MessageOptions) -> RestRequest {
    let mut body = json!({ "content": content });
    if options.is_private {
        body["isPrivate"] = json!(true);
    }
    if options.is_silent {
        body["isSilent"] = json!(true);
    }
    if !options.reply_to.is_empty() {
        body["replyMessageIds"] = json!(options.reply_to);
    }
    RestRequest::new(Method::Post, format!("channels/{channel_id}/messages")).with_body(body)
}

/// `PUT channels/{channel_id}/messages/{message_id}` with new content.
pub fn update_message_request(channel_id: Uuid, message_id: Uuid, content: &str) -> RestRequest {
    RestRequest::new(Method::Put, format!("channels/{channel_id}/messages/{message_id}"))
        .with_body(json!({ "content": content }))
}

/// `DELETE channels/{channel_id}/messages/{message_id}`.
pub fn delete_message_request(channel_id: Uuid, message_id: Uuid) -> RestRequest {
    RestRequest::new(Method::Delete, format!("channels/{channel_id}/messages/{message_id}"))
}

fn emote_path(channel_id: Uuid, content_id: Uuid, emote_id: u32) -> String {
    format!("channels/{channel_id}/content/{content_id}/emotes/{emote_id}")
}

/// `PUT channels/{channel_id}/content/{content_id}/emotes/{emote_id}`.
pub fn add_reaction_request(channel_id: Uuid, content_id: Uuid, emote_id: u32) -> RestRequest {
    RestRequest::new(Method::Put, emote_path(channel_id, content_id, emote_id))
}

/// `DELETE channels/{channel_id}/content/{content_id}/emotes/{emote_id}`.
pub fn remove_reaction_request(channel_id: Uuid, content_id: Uuid, emote_id: u32) -> RestRequest {
    RestRequest::new(Method::Delete, emote_path(channel_id, content_id, emote_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use guildline_proto::Message;

    struct Canned(Value);

    #[async_trait]
    impl RestClient for Canned {
        async fn execute(&self, _request: RestRequest) -> Result<Value, RestError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn reply_request_lists_target() {
        let channel = Uuid::from_u128(0xaa);
        let target = Uuid::from_u128(1);
        let request = create_message_request(channel, "hi", &MessageOptions::reply_to(target));

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, format!("channels/{channel}/messages"));
        assert_eq!(
            request.body,
            Some(json!({ "content": "hi", "replyMessageIds": [target] }))
        );
    }

    #[test]
    fn message_flags_only_sent_when_set() {
        let channel = Uuid::from_u128(0xaa);
        let plain = create_message_request(channel, "hi", &MessageOptions::default());
        assert_eq!(plain.body, Some(json!({ "content": "hi" })));

        let options = MessageOptions {
            is_private: true,
            is_silent: true,
            ..MessageOptions::default()
        };
        let flagged = create_message_request(channel, "hi", &options);
        assert_eq!(
            flagged.body,
            Some(json!({ "content": "hi", "isPrivate": true, "isSilent": true }))
        );
    }

    #[test]
    fn message_and_reaction_paths() {
        let channel = Uuid::from_u128(0xaa);
        let message = Uuid::from_u128(1);

        let update = update_message_request(channel, message, "edited");
        assert_eq!(update.method, Method::Put);
        assert_eq!(update.path, format!("channels/{channel}/messages/{message}"));
        assert_eq!(update.body, Some(json!({ "content": "edited" })));

        let delete = delete_message_request(channel, message);
        assert_eq!(delete.method, Method::Delete);
        assert_eq!(delete.path, update.path);
        assert_eq!(delete.body, None);

        let add = add_reaction_request(channel, message, 90002569);
        assert_eq!(add.method, Method::Put);
        assert_eq!(add.path, format!("channels/{channel}/content/{message}/emotes/90002569"));
        let remove = remove_reaction_request(channel, message, 90002569);
        assert_eq!(remove.method, Method::Delete);
        assert_eq!(remove.path, add.path);
    }

    #[tokio::test]
    async fn fetch_object_reads_field() {
        let client = Canned(json!({
            "message": {
                "id": "00000000-0000-0000-0000-000000000001",
                "channelId": "00000000-0000-0000-0000-0000000000aa",
                "content": "pong",
                "createdAt": "2021-06-15T20:15:00Z",
                "createdBy": "Ann6LewA"
            }
        }));

        let message: Message = fetch_object(
            &client,
            RestRequest::new(Method::Get, "channels/x/messages/y"),
            "message",
        )
        .await
        .unwrap();
        assert_eq!(message.text(), "pong");
    }

    #[tokio::test]
    async fn fetch_object_missing_field() {
        let client = Canned(json!({}));
        let err = fetch_object::<Message>(&client, RestRequest::new(Method::Get, "x"), "message")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "missing_field");
    }
}
