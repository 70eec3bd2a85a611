//! Gateway - outbound websocket connections feeding the event bus.
//!
//! Each keyed connection is driven by one supervisor task that owns the read
//! half of the socket, runs the heartbeat alongside it, and reconnects with
//! backoff after a fault. The primary connection uses the empty key.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use guildline_proto::frame::LAST_MESSAGE_ID_FIELD;
use guildline_proto::{Event, EventEnvelope, EventRegistry, Opcode, WelcomeEvent, decode_frame};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, instrument, trace, warn};

use super::backoff::Backoff;
use super::connection::{
    Connection, ConnectionState, ConnectionStatus, WsStream, build_request, handshake,
};
use crate::bus::{ConnectionEvent, DisconnectReason, EventBus};
use crate::config::GatewayConfig;
use crate::error::ConnectionError;
use crate::metrics;
use crate::telemetry::spans;

/// Key of the primary connection.
pub const PRIMARY_KEY: &str = "";

/// Floor for the heartbeat period; `tokio::time::interval` rejects zero.
const MIN_HEARTBEAT_MS: u64 = 1;

/// Time allowed for the close frame to go out on disconnect.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type WsSink = SplitSink<WsStream, Message>;

/// How a session's read loop ended.
enum SessionEnd {
    Cancelled,
    Faulted(String),
}

/// Manages keyed gateway connections and publishes what they receive.
#[derive(Clone)]
pub struct Gateway {
    config: Arc<GatewayConfig>,
    registry: Arc<EventRegistry>,
    bus: Arc<EventBus>,
    connections: Arc<DashMap<String, Arc<Connection>>>,
}

impl Gateway {
    /// Create a gateway publishing to `bus` with the default event registry.
    pub fn new(config: GatewayConfig, bus: Arc<EventBus>) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(EventRegistry::with_defaults()),
            bus,
            connections: Arc::new(DashMap::new()),
        }
    }

    /// Replace the event registry used to materialize frames.
    pub fn with_registry(mut self, registry: EventRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Open the primary connection at the configured URL.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let url = self.config.url.clone();
        self.connect_keyed(PRIMARY_KEY, &url).await
    }

    /// Open a connection under `key`.
    ///
    /// Returns once the welcome frame has been received and published.
    ///
    /// # Errors
    ///
    /// `AlreadyConnected` if `key` is live, `HandshakeTimeout` if no welcome
    /// arrives in time, or any transport/handshake failure.
    pub async fn connect_keyed(&self, key: &str, url: &str) -> Result<(), ConnectionError> {
        let conn = Arc::new(Connection::new(key, url));
        match self.connections.entry(key.to_string()) {
            Entry::Occupied(_) => return Err(ConnectionError::AlreadyConnected(key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&conn));
            }
        }

        conn.set_state(ConnectionState::Connecting);
        info!(key = %key, url = %url, "Connecting to gateway");

        let (ws, welcome) = match self.open(&conn).await {
            Ok(session) => session,
            Err(e) => {
                warn!(key = %key, error = %e, "Gateway connection failed");
                conn.set_state(ConnectionState::Idle);
                self.forget(&conn);
                return Err(e);
            }
        };

        let mut supervisor = conn.supervisor.lock().await;
        if conn.cancel.is_cancelled() {
            // disconnect() won the race; it owns the notification.
            return Err(ConnectionError::HandshakeClosed);
        }
        let interval = self.establish(&conn, &welcome);
        let gateway = self.clone();
        let task_conn = Arc::clone(&conn);
        *supervisor = Some(tokio::spawn(
            async move { gateway.supervise(task_conn, ws, interval).await }
                .instrument(spans::connection(key, url)),
        ));
        Ok(())
    }

    /// Close the primary connection.
    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        self.disconnect_keyed(PRIMARY_KEY).await
    }

    /// Close the connection under `key`.
    ///
    /// Stops the heartbeat and waits for it, sends a close frame, then
    /// emits `Disconnected { Requested }` exactly once.
    pub async fn disconnect_keyed(&self, key: &str) -> Result<(), ConnectionError> {
        let conn = self
            .connections
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ConnectionError::NotConnected(key.to_string()))?;
        if !conn.begin_close() {
            return Err(ConnectionError::NotConnected(key.to_string()));
        }

        conn.set_state(ConnectionState::Closing);
        conn.cancel.cancel();
        let supervisor = conn.supervisor.lock().await.take();
        if let Some(task) = supervisor
            && let Err(e) = task.await
        {
            warn!(key = %key, error = %e, "Connection supervisor ended abnormally");
        }

        self.forget(&conn);
        conn.set_state(ConnectionState::Idle);
        self.bus.publish_lifecycle(ConnectionEvent::Disconnected {
            key: key.to_string(),
            reason: DisconnectReason::Requested,
        });
        info!(key = %key, "Gateway disconnected");
        Ok(())
    }

    /// Close every live connection.
    pub async fn disconnect_all(&self) {
        for key in self.keys() {
            if let Err(e) = self.disconnect_keyed(&key).await {
                debug!(key = %key, error = %e, "Skipped disconnect");
            }
        }
    }

    /// Current state of `key`, `Idle` if there is no such connection.
    pub fn state(&self, key: &str) -> ConnectionState {
        self.connections
            .get(key)
            .map_or(ConnectionState::Idle, |conn| conn.state())
    }

    /// Snapshot of `key`'s status.
    pub fn status(&self, key: &str) -> Option<ConnectionStatus> {
        self.connections.get(key).map(|conn| conn.status())
    }

    /// Keys of every tracked connection.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        keys.sort_unstable();
        keys
    }

    fn forget(&self, conn: &Arc<Connection>) {
        self.connections
            .remove_if(&conn.key, |_, current| Arc::ptr_eq(current, conn));
    }

    /// Connect and wait for the welcome, racing cancellation.
    async fn open(&self, conn: &Connection) -> Result<(WsStream, EventEnvelope), ConnectionError> {
        let request = build_request(
            &conn.url,
            self.config.token.as_deref(),
            conn.last_message_id().as_deref(),
        )?;
        let limit = Duration::from_millis(self.config.handshake_timeout_ms);
        tokio::select! {
            _ = conn.cancel.cancelled() => Err(ConnectionError::HandshakeClosed),
            result = handshake(request, limit) => result,
        }
    }

    /// Record the welcome, publish it, and mark the connection open.
    fn establish(&self, conn: &Connection, welcome: &EventEnvelope) -> Duration {
        let mut interval_ms = welcome
            .heartbeat_interval()
            .unwrap_or(self.config.default_heartbeat_ms);
        if interval_ms < MIN_HEARTBEAT_MS {
            warn!(key = %conn.key, "Zero heartbeat interval, using {MIN_HEARTBEAT_MS} ms");
            interval_ms = MIN_HEARTBEAT_MS;
        }
        let interval = Duration::from_millis(interval_ms);

        let cursor = welcome.message_id.clone().or_else(|| {
            welcome
                .payload
                .get(LAST_MESSAGE_ID_FIELD)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });
        if cursor.is_some() {
            conn.set_last_message_id(cursor);
        }

        let event = match self.registry.materialize(welcome) {
            Ok(event @ Event::Welcome(_)) => event,
            Ok(other) => {
                debug!(kind = %other.kind(), "Welcome tag mapped to a non-welcome event");
                Self::bare_welcome(interval_ms)
            }
            Err(e) => {
                warn!(error = %e, "Welcome payload did not decode");
                Self::bare_welcome(interval_ms)
            }
        };

        conn.mark_open(interval);
        metrics::add_open_connections(1);
        self.bus.publish(event);
        self.bus.publish_lifecycle(ConnectionEvent::Connected {
            key: conn.key.clone(),
        });
        info!(key = %conn.key, heartbeat_ms = interval_ms, "Gateway connected");
        interval
    }

    fn bare_welcome(interval_ms: u64) -> Event {
        Event::Welcome(WelcomeEvent {
            heartbeat_interval_ms: Some(interval_ms),
            ..WelcomeEvent::default()
        })
    }

    #[instrument(name = "supervisor", skip_all)]
    async fn supervise(self, conn: Arc<Connection>, mut ws: WsStream, mut interval: Duration) {
        let mut backoff = Backoff::from_config(&self.config.reconnect);
        loop {
            let end = self.run_session(&conn, ws, interval).await;
            metrics::add_open_connections(-1);

            let reason = match end {
                SessionEnd::Cancelled => return,
                SessionEnd::Faulted(reason) => reason,
            };

            conn.set_state(ConnectionState::Faulted);
            warn!(reason = %reason, "Gateway connection faulted");
            self.bus.publish_lifecycle(ConnectionEvent::Disconnected {
                key: conn.key.clone(),
                reason: DisconnectReason::Faulted(reason),
            });

            match self.reconnect(&conn, &mut backoff).await {
                Some((next_ws, welcome)) => {
                    interval = self.establish(&conn, &welcome);
                    ws = next_ws;
                }
                None => {
                    if !conn.cancel.is_cancelled() {
                        conn.set_state(ConnectionState::Idle);
                        self.forget(&conn);
                        info!("Gateway connection abandoned");
                    }
                    return;
                }
            }
        }
    }

    /// Retry the handshake until it succeeds, the policy gives up, or the
    /// connection is cancelled.
    async fn reconnect(
        &self,
        conn: &Connection,
        backoff: &mut Backoff,
    ) -> Option<(WsStream, EventEnvelope)> {
        let policy = &self.config.reconnect;
        if !policy.enabled {
            return None;
        }

        loop {
            if let Some(max) = policy.max_attempts
                && backoff.attempt() >= max
            {
                warn!(attempts = max, "Reconnect attempts exhausted");
                return None;
            }

            let delay = backoff.next_delay();
            let attempt = backoff.attempt();
            conn.set_state(ConnectionState::Reconnecting);
            conn.set_reconnect_attempts(attempt);
            metrics::record_reconnect();
            self.bus.publish_lifecycle(ConnectionEvent::Reconnecting {
                key: conn.key.clone(),
                attempt,
                delay,
            });
            info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                _ = conn.cancel.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            conn.set_state(ConnectionState::Connecting);
            match self.open(conn).await {
                Ok(session) => {
                    backoff.reset();
                    return Some(session);
                }
                Err(_) if conn.cancel.is_cancelled() => return None,
                Err(e @ ConnectionError::InvalidRequest(_)) => {
                    warn!(error = %e, "Reconnect request cannot be built");
                    return None;
                }
                Err(e) => warn!(attempt, error = %e, "Reconnect attempt failed"),
            }
        }
    }

    /// Drive one open session until it is cancelled or faults.
    async fn run_session(&self, conn: &Arc<Connection>, ws: WsStream, interval: Duration) -> SessionEnd {
        let (sink, mut stream) = ws.split();
        let sink = Arc::new(AsyncMutex::new(sink));
        let heartbeat_cancel = conn.cancel.child_token();
        let heartbeat = spawn_heartbeat(
            Arc::clone(&sink),
            Arc::clone(conn),
            interval,
            heartbeat_cancel.clone(),
        );

        let end = loop {
            tokio::select! {
                biased;
                _ = conn.cancel.cancelled() => break SessionEnd::Cancelled,
                message = stream.next() => match message {
                    Some(Ok(Message::Text(text))) => self.handle_frame(conn, &text),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => self.handle_frame(conn, &text),
                        Err(e) => {
                            metrics::record_frame();
                            metrics::record_dropped("invalid_utf8");
                            warn!(error = %e, "Dropping binary frame that is not UTF-8");
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let detail = frame.map_or_else(
                            || "close frame".to_string(),
                            |f| format!("close frame {}: {}", u16::from(f.code), f.reason),
                        );
                        break SessionEnd::Faulted(detail);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break SessionEnd::Faulted(e.to_string()),
                    None => break SessionEnd::Faulted("end of stream".to_string()),
                },
            }
        };

        heartbeat_cancel.cancel();
        if let Err(e) = heartbeat.await {
            warn!(error = %e, "Heartbeat task ended abnormally");
        }

        if matches!(end, SessionEnd::Cancelled) {
            let mut sink = sink.lock().await;
            let closed = tokio::time::timeout(CLOSE_TIMEOUT, async {
                sink.send(Message::Close(None)).await?;
                sink.close().await
            })
            .await;
            match closed {
                Ok(Ok(())) => debug!("Close frame sent"),
                Ok(Err(e)) => debug!(error = %e, "Close frame not delivered"),
                Err(_) => debug!("Close frame timed out"),
            }
        }
        end
    }

    /// Decode, materialize and publish one inbound frame.
    fn handle_frame(&self, conn: &Connection, text: &str) {
        metrics::record_frame();
        let envelope = match decode_frame(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                metrics::record_dropped(e.error_code());
                return;
            }
        };

        if let Some(id) = &envelope.message_id {
            conn.set_last_message_id(Some(id.clone()));
        }

        match envelope.opcode {
            Opcode::Resumed => {
                info!("Missed events replayed");
                return;
            }
            Opcode::Error => {
                warn!(payload = %envelope.payload, "Gateway reported an error");
                metrics::record_dropped("gateway_error");
                return;
            }
            Opcode::InvalidCursor => {
                warn!("Resume cursor rejected, clearing it");
                conn.set_last_message_id(None);
                return;
            }
            Opcode::Event | Opcode::Welcome | Opcode::Other(_) => {}
        }

        if envelope.tag.is_empty() {
            debug!("Ignoring welcome frame on an open connection");
            metrics::record_dropped("unexpected_welcome");
            return;
        }

        match self.registry.materialize(&envelope) {
            Ok(Event::Unrecognized { tag }) => {
                trace!(tag = %tag, "Dropping unrecognized event");
                metrics::record_dropped("unrecognized");
            }
            Ok(event) => {
                self.bus.publish(event);
            }
            Err(e) => {
                warn!(tag = %envelope.tag, error = %e, "Dropping event that did not decode");
                metrics::record_dropped(e.error_code());
            }
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("url", &self.config.url)
            .field("connections", &self.keys())
            .finish()
    }
}

/// Send an empty ping every `period` until cancelled.
fn spawn_heartbeat(
    sink: Arc<AsyncMutex<WsSink>>,
    conn: Arc<Connection>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let sent = sink.lock().await.send(Message::Ping(Vec::new())).await;
                        match sent {
                            Ok(()) => {
                                conn.record_heartbeat();
                                trace!("Heartbeat sent");
                            }
                            Err(e) => {
                                warn!(error = %e, "Heartbeat failed");
                                break;
                            }
                        }
                    }
                }
            }
        }
        .in_current_span(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_key_is_idle_and_not_connected() {
        let gateway = Gateway::new(GatewayConfig::default(), Arc::new(EventBus::new()));

        assert_eq!(gateway.state("missing"), ConnectionState::Idle);
        assert!(gateway.status("missing").is_none());
        assert!(gateway.keys().is_empty());

        let err = gateway.disconnect().await.unwrap_err();
        assert!(matches!(err, ConnectionError::NotConnected(ref key) if key.is_empty()));
    }

    #[tokio::test]
    async fn refused_connection_leaves_no_entry() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let gateway = Gateway::new(
            GatewayConfig::with_url(format!("ws://{addr}")),
            Arc::new(EventBus::new()),
        );
        let err = gateway.connect().await.unwrap_err();
        assert_eq!(err.error_code(), "transport");
        assert!(gateway.keys().is_empty());
    }

    #[test]
    fn frames_on_open_connection_reach_the_bus() {
        let bus = Arc::new(EventBus::new());
        let gateway = Gateway::new(GatewayConfig::default(), Arc::clone(&bus));
        let conn = Connection::new(PRIMARY_KEY, "ws://unused");
        let mut all = bus.subscribe_all();

        gateway.handle_frame(&conn, "not json");
        gateway.handle_frame(&conn, r#"{"op":0,"t":"SomethingNew","d":{},"s":"m-1"}"#);
        gateway.handle_frame(
            &conn,
            r#"{"op":0,"t":"TeamXpAdded","d":{"serverId":"wlVr3Ggl","userIds":[],"amount":5},"s":"m-2"}"#,
        );

        let event = all.try_recv().unwrap();
        assert!(matches!(&*event, Event::XpAdded(xp) if xp.amount == 5));
        assert!(all.try_recv().is_none());
        assert_eq!(conn.last_message_id().as_deref(), Some("m-2"));
    }

    #[tokio::test]
    async fn zero_heartbeat_interval_is_clamped() {
        let mut config = GatewayConfig::default();
        config.default_heartbeat_ms = 0;
        let gateway = Gateway::new(config, Arc::new(EventBus::new()));
        let conn = Connection::new(PRIMARY_KEY, "ws://unused");

        let without_interval = decode_frame(r#"{"op":1,"d":{}}"#).unwrap();
        let interval = gateway.establish(&conn, &without_interval);
        assert_eq!(interval, Duration::from_millis(MIN_HEARTBEAT_MS));

        let announced_zero = EventEnvelope::welcome(0);
        let interval = gateway.establish(&conn, &announced_zero);
        assert_eq!(interval, Duration::from_millis(MIN_HEARTBEAT_MS));

        // The clamped period is accepted by the heartbeat ticker.
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        ticker.tick().await;
    }

    #[test]
    fn invalid_cursor_clears_resume_point() {
        let gateway = Gateway::new(GatewayConfig::default(), Arc::new(EventBus::new()));
        let conn = Connection::new(PRIMARY_KEY, "ws://unused");
        conn.set_last_message_id(Some("m-1".into()));

        gateway.handle_frame(&conn, r#"{"op":9,"d":{}}"#);
        assert_eq!(conn.last_message_id(), None);
    }
}
