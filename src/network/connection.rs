//! Per-connection state and the websocket handshake.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use guildline_proto::{EventEnvelope, decode_frame};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use crate::error::ConnectionError;

/// Header carrying the bot token.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Header asking the gateway to replay events after the given wire id.
pub const LAST_MESSAGE_ID_HEADER: &str = "guilded-last-message-id";

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle state of one keyed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Faulted,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Faulted => "faulted",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a connection.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    pub key: String,
    pub url: String,
    pub state: ConnectionState,
    /// Interval negotiated by the most recent welcome frame.
    pub heartbeat_interval: Option<Duration>,
    /// When the last heartbeat ping was written.
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Resume cursor: the most recent wire message id seen.
    pub last_message_id: Option<String>,
    /// When the current session finished its handshake.
    pub connected_at: Option<DateTime<Utc>>,
    /// Reconnect attempts since the last successful handshake.
    pub reconnect_attempts: u32,
}

/// Shared handle to one keyed connection.
///
/// Owned by the gateway's connection table and by the supervisor task.
pub(crate) struct Connection {
    pub key: String,
    pub url: String,
    pub cancel: CancellationToken,
    pub supervisor: AsyncMutex<Option<JoinHandle<()>>>,
    status: Mutex<ConnectionStatus>,
    closing: AtomicBool,
}

impl Connection {
    pub fn new(key: impl Into<String>, url: impl Into<String>) -> Self {
        let key = key.into();
        let url = url.into();
        Self {
            status: Mutex::new(ConnectionStatus {
                key: key.clone(),
                url: url.clone(),
                state: ConnectionState::Idle,
                heartbeat_interval: None,
                last_heartbeat: None,
                last_message_id: None,
                connected_at: None,
                reconnect_attempts: 0,
            }),
            key,
            url,
            cancel: CancellationToken::new(),
            supervisor: AsyncMutex::new(None),
            closing: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status.lock().state
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.status.lock().state = state;
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.lock().clone()
    }

    /// Mark the handshake complete.
    pub fn mark_open(&self, heartbeat_interval: Duration) {
        let mut status = self.status.lock();
        status.state = ConnectionState::Open;
        status.heartbeat_interval = Some(heartbeat_interval);
        status.connected_at = Some(Utc::now());
        status.reconnect_attempts = 0;
    }

    pub fn set_reconnect_attempts(&self, attempts: u32) {
        self.status.lock().reconnect_attempts = attempts;
    }

    pub fn record_heartbeat(&self) {
        self.status.lock().last_heartbeat = Some(Utc::now());
    }

    pub fn last_message_id(&self) -> Option<String> {
        self.status.lock().last_message_id.clone()
    }

    pub fn set_last_message_id(&self, id: Option<String>) {
        self.status.lock().last_message_id = id;
    }

    /// Claim the right to close this connection. Only the first caller wins.
    pub fn begin_close(&self) -> bool {
        !self.closing.swap(true, Ordering::AcqRel)
    }
}

/// Build the upgrade request for `url`.
///
/// The token is sent verbatim after `Bearer `. A resume cursor asks the
/// gateway to replay everything after that wire id.
pub(crate) fn build_request(
    url: &str,
    token: Option<&str>,
    last_message_id: Option<&str>,
) -> Result<Request, ConnectionError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| ConnectionError::InvalidRequest(e.to_string()))?;

    let headers = request.headers_mut();
    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ConnectionError::InvalidRequest(format!("token: {e}")))?;
        headers.insert(AUTHORIZATION_HEADER, value);
    }
    if let Some(id) = last_message_id {
        let value = HeaderValue::from_str(id)
            .map_err(|e| ConnectionError::InvalidRequest(format!("resume cursor: {e}")))?;
        headers.insert(LAST_MESSAGE_ID_HEADER, value);
    }
    Ok(request)
}

/// Open the socket and wait for the welcome frame, both within `limit`.
pub(crate) async fn handshake(
    request: Request,
    limit: Duration,
) -> Result<(WsStream, EventEnvelope), ConnectionError> {
    tokio::time::timeout(limit, async {
        let (mut ws, _response) = connect_async(request).await?;
        let welcome = wait_for_welcome(&mut ws).await?;
        Ok::<_, ConnectionError>((ws, welcome))
    })
    .await
    .map_err(|_| ConnectionError::HandshakeTimeout(limit))?
}

async fn wait_for_welcome(ws: &mut WsStream) -> Result<EventEnvelope, ConnectionError> {
    while let Some(message) = ws.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Binary(bytes) => String::from_utf8(bytes)
                .map_err(|e| ConnectionError::InvalidHandshake(e.to_string()))?,
            Message::Close(_) => return Err(ConnectionError::HandshakeClosed),
            _ => continue,
        };

        let envelope =
            decode_frame(&text).map_err(|e| ConnectionError::InvalidHandshake(e.to_string()))?;
        if envelope.is_welcome() {
            return Ok(envelope);
        }
        return Err(ConnectionError::InvalidHandshake(format!(
            "expected welcome frame, got {:?}",
            envelope.tag
        )));
    }
    Err(ConnectionError::HandshakeClosed)
}
