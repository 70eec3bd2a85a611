//! Mock gateway server.
//!
//! Accepts websocket connections on an ephemeral port, optionally sends a
//! welcome frame, and hands each accepted connection to the test as a
//! [`Session`] it can drive.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderMap;

use super::frames;

/// What the server sends right after the upgrade.
#[derive(Debug, Clone, Copy)]
pub enum Welcome {
    /// A welcome frame announcing this heartbeat interval.
    Interval(u64),
    /// Nothing; the client should time out.
    Withheld,
}

enum SessionCommand {
    Send(Message),
    Close,
    Drop,
}

/// One accepted client connection.
pub struct Session {
    headers: HeaderMap,
    commands: mpsc::UnboundedSender<SessionCommand>,
    inbound: mpsc::UnboundedReceiver<Message>,
}

impl Session {
    /// Value of a request header sent by the client.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.commands.send(SessionCommand::Send(Message::Text(text.into())));
    }

    pub fn send_binary(&self, bytes: Vec<u8>) {
        let _ = self.commands.send(SessionCommand::Send(Message::Binary(bytes)));
    }

    /// Send a close frame.
    pub fn close(&self) {
        let _ = self.commands.send(SessionCommand::Close);
    }

    /// Drop the TCP connection without a close frame.
    pub fn drop_connection(&self) {
        let _ = self.commands.send(SessionCommand::Drop);
    }

    /// Next message from the client, if one arrives within `within`.
    pub async fn next_inbound(&mut self, within: Duration) -> Option<Message> {
        tokio::time::timeout(within, self.inbound.recv()).await.ok().flatten()
    }

    /// Wait for a heartbeat ping with an empty payload.
    pub async fn expect_ping(&mut self, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.next_inbound(remaining).await {
                Some(Message::Ping(payload)) => return payload.is_empty(),
                Some(_) => continue,
                None => return false,
            }
        }
    }

    /// Wait for the client's close frame.
    pub async fn expect_close(&mut self, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.next_inbound(remaining).await {
                Some(Message::Close(_)) => return true,
                Some(_) => continue,
                None => return false,
            }
        }
    }
}

/// A websocket server standing in for the real gateway.
pub struct MockGateway {
    addr: SocketAddr,
    sessions: mpsc::UnboundedReceiver<Session>,
    accept_task: JoinHandle<()>,
}

impl MockGateway {
    pub async fn start(welcome: Welcome) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock gateway");
        let addr = listener.local_addr().expect("local addr");
        let (session_tx, sessions) = mpsc::unbounded_channel();

        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let session_tx = session_tx.clone();
                tokio::spawn(serve(stream, welcome, session_tx));
            }
        });

        Self {
            addr,
            sessions,
            accept_task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Wait for the next client connection.
    pub async fn next_session(&mut self) -> Session {
        tokio::time::timeout(super::WAIT, self.sessions.recv())
            .await
            .expect("timed out waiting for a client")
            .expect("accept loop ended")
    }
}

impl Drop for MockGateway {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve(
    stream: tokio::net::TcpStream,
    welcome: Welcome,
    session_tx: mpsc::UnboundedSender<Session>,
) {
    let captured = Arc::new(Mutex::new(HeaderMap::new()));
    let sink = Arc::clone(&captured);
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        *sink.lock() = request.headers().clone();
        Ok(response)
    };
    let Ok(mut ws) = accept_hdr_async(stream, callback).await else {
        return;
    };

    if let Welcome::Interval(ms) = welcome
        && ws.send(Message::Text(frames::welcome(ms))).await.is_err()
    {
        return;
    }

    let (commands, mut command_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound) = mpsc::unbounded_channel();
    let headers = captured.lock().clone();
    if session_tx
        .send(Session {
            headers,
            commands,
            inbound,
        })
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(SessionCommand::Send(message)) => {
                    if ws.send(message).await.is_err() {
                        break;
                    }
                }
                Some(SessionCommand::Close) => {
                    let _ = ws.close(None).await;
                }
                Some(SessionCommand::Drop) | None => break,
            },
            message = ws.next() => match message {
                Some(Ok(message)) => {
                    let _ = inbound_tx.send(message);
                }
                _ => break,
            },
        }
    }
}
