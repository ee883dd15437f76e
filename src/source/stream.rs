//! Socket.IO event-stream source.
//!
//! Keeps a WebSocket open to the backend's Socket.IO endpoint, joins the
//! default namespace and forwards every configured event as a reading.
//! Lost or failed connections are retried forever with exponential
//! backoff until the subscription is cancelled. A handshake that does not
//! finish within the connect timeout, or a server that stays silent past
//! its announced heartbeat, counts as a lost connection.

use crate::config::Config;
use crate::error::TransportError;
use crate::posture::PostureEvent;
use crate::source::socketio::{self, EnginePacket, SocketPacket, DEFAULT_NAMESPACE};
use crate::source::{PostureSource, Subscription};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Base delay between reconnection attempts.
const RECONNECT_BASE_DELAY_MS: u64 = 1_000;

/// Maximum delay between reconnection attempts.
const MAX_RECONNECT_DELAY_MS: u64 = 5_000;

/// Default limit for opening the socket and completing the handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Subscribes to posture events over Socket.IO.
#[derive(Debug, Clone)]
pub struct StreamSource {
    url: String,
    event_name: String,
    connect_timeout: Duration,
}

/// How a single connection ended.
enum SessionEnd {
    /// Shutdown was requested or the controller went away
    Stopped,
    /// The transport failed
    Failed(TransportError),
}

impl StreamSource {
    /// Create a new stream source for a `ws://` or `wss://` Socket.IO URL.
    pub fn new(url: impl Into<String>, event_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            event_name: event_name.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Create a stream source from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.socket_url(), config.event_name.clone())
            .with_connect_timeout(config.request_timeout)
    }

    /// Limit for the WebSocket connect plus the Engine.IO open and the
    /// namespace ack.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Connection loop with reconnection logic.
    async fn connection_loop(
        self,
        events: mpsc::Sender<PostureEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let mut attempts = 0u32;

        loop {
            match self.run_connection(&events, &mut shutdown, &mut attempts).await {
                SessionEnd::Stopped => break,
                SessionEnd::Failed(reason) => {
                    tracing::warn!(url = %self.url, error = %reason.detail(), "Socket transport down");
                    if events.send(PostureEvent::TransportDown(reason)).await.is_err() {
                        break;
                    }
                }
            }

            attempts = attempts.saturating_add(1);
            let delay = backoff_delay(attempts);
            tracing::debug!(attempt = attempts, delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::debug!("Socket source stopped");
    }

    /// Run a single WebSocket connection until it ends.
    async fn run_connection(
        &self,
        events: &mpsc::Sender<PostureEvent>,
        shutdown: &mut oneshot::Receiver<()>,
        attempts: &mut u32,
    ) -> SessionEnd {
        let handshake_deadline = Instant::now() + self.connect_timeout;

        let connected = tokio::select! {
            _ = &mut *shutdown => return SessionEnd::Stopped,
            result = tokio::time::timeout_at(handshake_deadline, connect_async(self.url.as_str())) => result,
        };

        let mut ws = match connected {
            Ok(Ok((ws, _))) => ws,
            Ok(Err(e)) => return SessionEnd::Failed(TransportError::ConnectFailed(e.to_string())),
            Err(_) => {
                return SessionEnd::Failed(TransportError::ConnectFailed(
                    "connect timed out".to_string(),
                ))
            }
        };

        // Whether the namespace join has been acknowledged
        let mut joined = false;
        // Silence allowed by the server's heartbeat, known after the open packet
        let mut heartbeat: Option<Duration> = None;
        // The handshake deadline until joined, then the heartbeat deadline
        let mut deadline = Some(handshake_deadline);

        loop {
            let message = tokio::select! {
                _ = &mut *shutdown => {
                    let _ = ws.close(None).await;
                    return SessionEnd::Stopped;
                }
                _ = wait_until(deadline) => {
                    let detail = if joined { "ping timeout" } else { "handshake timed out" };
                    return SessionEnd::Failed(lost(joined, detail));
                }
                message = ws.next() => message,
            };

            if joined {
                deadline = heartbeat.map(|h| Instant::now() + h);
            }

            let text = match message {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Ping(data))) => {
                    let _ = ws.send(Message::Pong(data)).await;
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => {
                    return SessionEnd::Failed(lost(joined, "socket closed by server"));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return SessionEnd::Failed(lost(joined, &e.to_string())),
            };

            let packet = match socketio::parse(text.as_str()) {
                Ok(packet) => packet,
                Err(e) => {
                    tracing::debug!(error = %e, "Ignoring packet");
                    continue;
                }
            };

            let reply = match packet {
                EnginePacket::Open(info) => {
                    tracing::debug!(
                        sid = %info.sid,
                        ping_interval_ms = info.ping_interval,
                        ping_timeout_ms = info.ping_timeout,
                        "Engine.IO session opened"
                    );
                    heartbeat = info.heartbeat_timeout();
                    Some(socketio::encode_connect(DEFAULT_NAMESPACE))
                }
                EnginePacket::Ping => Some(socketio::encode_pong()),
                EnginePacket::Close => {
                    return SessionEnd::Failed(lost(joined, "engine closed"));
                }
                EnginePacket::Message(SocketPacket::Connect { namespace, .. })
                    if namespace == DEFAULT_NAMESPACE =>
                {
                    joined = true;
                    *attempts = 0;
                    deadline = heartbeat.map(|h| Instant::now() + h);
                    tracing::info!(url = %self.url, "Connected to posture stream");
                    if events.send(PostureEvent::TransportUp).await.is_err() {
                        return SessionEnd::Stopped;
                    }
                    None
                }
                EnginePacket::Message(SocketPacket::ConnectError { namespace, data })
                    if namespace == DEFAULT_NAMESPACE =>
                {
                    let detail = data
                        .as_ref()
                        .and_then(|d| d.get("message"))
                        .and_then(|m| m.as_str())
                        .unwrap_or("namespace connect refused")
                        .to_string();
                    return SessionEnd::Failed(TransportError::ConnectFailed(detail));
                }
                EnginePacket::Message(SocketPacket::Disconnect { namespace })
                    if namespace == DEFAULT_NAMESPACE =>
                {
                    return SessionEnd::Failed(lost(joined, "server disconnected namespace"));
                }
                EnginePacket::Message(SocketPacket::Event {
                    namespace,
                    name,
                    mut args,
                    ..
                }) if namespace == DEFAULT_NAMESPACE && name == self.event_name => {
                    let payload = if args.is_empty() {
                        serde_json::Value::Null
                    } else {
                        args.swap_remove(0)
                    };
                    tracing::debug!(%payload, "Posture event received");
                    if events.send(PostureEvent::Reading(payload)).await.is_err() {
                        return SessionEnd::Stopped;
                    }
                    None
                }
                _ => None,
            };

            if let Some(reply) = reply {
                if let Err(e) = ws.send(Message::Text(reply.into())).await {
                    return SessionEnd::Failed(lost(joined, &e.to_string()));
                }
            }
        }
    }
}

impl PostureSource for StreamSource {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn spawn(self: Box<Self>, events: mpsc::Sender<PostureEvent>) -> Subscription {
        let source = *self;
        Subscription::spawn(move |shutdown| source.connection_loop(events, shutdown))
    }
}

/// Sleep until `deadline`, or forever without one.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// A failure before the namespace join counts as a failed connect.
fn lost(joined: bool, detail: &str) -> TransportError {
    if joined {
        TransportError::Dropped(detail.to_string())
    } else {
        TransportError::ConnectFailed(detail.to_string())
    }
}

/// Exponential backoff: 1s, 2s, 4s, then capped at 5s.
fn backoff_delay(attempts: u32) -> Duration {
    let exp = attempts.saturating_sub(1).min(6);
    let ms = RECONNECT_BASE_DELAY_MS.saturating_mul(1 << exp);
    Duration::from_millis(ms.min(MAX_RECONNECT_DELAY_MS))
}
