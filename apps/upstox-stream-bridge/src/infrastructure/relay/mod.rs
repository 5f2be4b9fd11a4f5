//! Feed Relay Sessions
//!
//! One relay session per connected client. A session owns exactly one
//! upstream feed socket, one downstream client sink, and one cancellation
//! token; nothing is shared between sessions, so tearing one down never
//! touches another. Upstream frames are forwarded byte-for-byte to the one
//! originating client -- there is no cross-client fan-out, and a client
//! that disconnects takes only its own upstream socket with it.
//!
//! Scheduler signals arrive on the session's broadcast subscription and are
//! interleaved onto the same downstream sink as JSON text events.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use axum::extract::ws::{CloseFrame, Message as ClientMessage, Utf8Bytes, WebSocket, close_code};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::relay::SessionLifecycle;
use crate::domain::signal::PushEvent;
use crate::infrastructure::broadcast::SignalHub;
use crate::infrastructure::metrics;
use crate::infrastructure::upstox::{AccessToken, FeedAuthClient, UpstreamConnector};

// =============================================================================
// Session Registry
// =============================================================================

/// Process-wide counters over live relay sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: AtomicUsize,
    opened_total: AtomicU64,
    last_error: parking_lot::RwLock<Option<String>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: AtomicUsize::new(0),
            opened_total: AtomicU64::new(0),
            last_error: parking_lot::RwLock::new(None),
        }
    }

    /// Register a session; the returned guard deregisters on drop.
    #[must_use]
    pub fn begin(self: Arc<Self>) -> SessionGuard {
        self.active.fetch_add(1, Ordering::AcqRel);
        self.opened_total.fetch_add(1, Ordering::Relaxed);
        metrics::record_session_opened();
        SessionGuard { registry: self }
    }

    /// Sessions currently streaming or authorizing.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Sessions opened since process start.
    #[must_use]
    pub fn opened_total(&self) -> u64 {
        self.opened_total.load(Ordering::Relaxed)
    }

    /// Record the failure that ended a session.
    pub fn record_error(&self, message: String) {
        *self.last_error.write() = Some(message);
    }

    /// The most recent session failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }
}

/// Keeps a session counted while it runs.
#[derive(Debug)]
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.active.fetch_sub(1, Ordering::AcqRel);
        metrics::record_session_closed();
    }
}

// =============================================================================
// Relay Context
// =============================================================================

/// Shared dependencies handed to every relay session.
#[derive(Debug, Clone)]
pub struct RelayContext {
    /// Feed-authorization handshake client.
    pub feed_auth: Arc<FeedAuthClient>,
    /// Upstream socket connector.
    pub connector: UpstreamConnector,
    /// Signal broadcast hub the session subscribes to.
    pub signals: Arc<SignalHub>,
    /// Live-session registry.
    pub registry: Arc<SessionRegistry>,
    /// Process shutdown token; sessions derive their own child tokens.
    pub shutdown: CancellationToken,
}

// =============================================================================
// Session Loop
// =============================================================================

/// Run one relay session to completion.
///
/// The caller has already validated the bearer token's presence; this
/// function drives the `Authorizing -> Streaming -> Closed` phases and
/// tears everything down on the first failure. It never returns an error:
/// every failure path ends in a closed session and a log line.
pub async fn run_session(mut client: WebSocket, token: AccessToken, ctx: RelayContext) {
    let session_id = Uuid::new_v4();
    let mut lifecycle = SessionLifecycle::new();
    let _guard = Arc::clone(&ctx.registry).begin();

    lifecycle.begin_authorizing();
    tracing::info!(session = %session_id, phase = lifecycle.phase().as_str(), "Relay session opened");

    let socket_url = match ctx.feed_auth.authorize(&token).await {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(session = %session_id, error = %e, "Feed authorization failed");
            ctx.registry.record_error(e.to_string());
            close_client(&mut client, close_code::POLICY, "feed authorization failed").await;
            lifecycle.close();
            return;
        }
    };

    let upstream = match ctx.connector.connect(&socket_url, &token).await {
        Ok(socket) => socket,
        Err(e) => {
            tracing::warn!(session = %session_id, error = %e, "Upstream connect failed");
            ctx.registry.record_error(e.to_string());
            close_client(&mut client, close_code::ERROR, "upstream connection failed").await;
            lifecycle.close();
            return;
        }
    };

    lifecycle.begin_streaming();
    tracing::info!(session = %session_id, phase = lifecycle.phase().as_str(), "Relay session streaming");

    let (mut up_write, mut up_read) = upstream.split();
    let (mut down_write, mut down_read) = client.split();
    let mut signals = ctx.signals.subscribe();
    let mut signals_open = true;
    let cancel = ctx.shutdown.child_token();

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!(session = %session_id, "Relay session cancelled by shutdown");
                break;
            }

            frame = up_read.next() => match frame {
                Some(Ok(UpstreamMessage::Binary(bytes))) => {
                    if down_write.send(ClientMessage::Binary(bytes)).await.is_err() {
                        break;
                    }
                    metrics::record_frame_forwarded();
                }
                Some(Ok(UpstreamMessage::Text(text))) => {
                    if down_write.send(ClientMessage::Text(text.to_string().into())).await.is_err() {
                        break;
                    }
                    metrics::record_frame_forwarded();
                }
                Some(Ok(UpstreamMessage::Ping(payload))) => {
                    if up_write.send(UpstreamMessage::Pong(payload)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(UpstreamMessage::Close(_))) | None => {
                    tracing::info!(session = %session_id, "Upstream closed the feed socket");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(session = %session_id, error = %e, "Upstream read error");
                    ctx.registry.record_error(e.to_string());
                    break;
                }
            },

            message = down_read.next() => match message {
                Some(Ok(ClientMessage::Close(_))) | None => {
                    tracing::info!(session = %session_id, "Client disconnected");
                    break;
                }
                Some(Ok(_)) => {
                    // Inbound client chatter is ignored; the feed is one-way.
                }
                Some(Err(e)) => {
                    tracing::warn!(session = %session_id, error = %e, "Client read error");
                    break;
                }
            },

            signal = signals.recv(), if signals_open => match signal {
                Ok(signal) => {
                    let event = PushEvent::Signal(signal);
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            if down_write.send(ClientMessage::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::error!(session = %session_id, error = %e, "Signal serialization failed");
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(session = %session_id, skipped, "Signal receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    signals_open = false;
                }
            },
        }
    }

    // Teardown: this session's sockets only. Other sessions are untouched.
    let _ = up_write.close().await;
    let _ = down_write.close().await;
    lifecycle.close();
    tracing::info!(session = %session_id, phase = lifecycle.phase().as_str(), "Relay session closed");
}

/// Best-effort close frame toward the client before the session ends.
async fn close_client(client: &mut WebSocket, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason),
    };
    let _ = client.send(ClientMessage::Close(Some(frame))).await;
}
