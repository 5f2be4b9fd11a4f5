//! Relay Streaming Integration Tests
//!
//! Drives the full relay path with real sockets: a local feed-authorization
//! endpoint, local upstream WebSocket servers, and the bridge router bound
//! on a random port. Verifies token gating, byte-for-byte forwarding,
//! per-session isolation, and signal fan-out.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response as HandshakeResponse,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use upstox_stream_bridge::{
    ApiState, CatalogClient, CatalogSource, ContractCache, ContractTarget, FeedAuthClient,
    RelayContext, SessionRegistry, Signal, SignalHub, TokenClient, UpstoxCredentials,
    UpstreamConnector, router,
};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const GOOD_TOKEN: &str = "good-token";

// =============================================================================
// Fake Upstream Feed Socket
// =============================================================================

/// One-connection upstream feed server. Frames pushed through `send` are
/// delivered as binary WebSocket messages; `close` ends the connection with
/// a normal close frame.
struct FakeUpstream {
    url: String,
    frames: Option<mpsc::UnboundedSender<Vec<u8>>>,
    connections: Arc<AtomicUsize>,
    saw_bearer: Arc<AtomicBool>,
}

impl FakeUpstream {
    async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let connections = Arc::new(AtomicUsize::new(0));
        let saw_bearer = Arc::new(AtomicBool::new(false));

        let conn_count = Arc::clone(&connections);
        let bearer_flag = Arc::clone(&saw_bearer);
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            conn_count.fetch_add(1, Ordering::SeqCst);

            let flag = Arc::clone(&bearer_flag);
            let callback = move |req: &Request, resp: HandshakeResponse| -> Result<HandshakeResponse, ErrorResponse> {
                let bearer = req
                    .headers()
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|v| v.starts_with("Bearer "));
                flag.store(bearer, Ordering::SeqCst);
                Ok(resp)
            };

            let mut socket = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();

            while let Some(frame) = rx.recv().await {
                if socket.send(Message::Binary(frame.into())).await.is_err() {
                    return;
                }
            }
            let _ = socket.close(None).await;
        });

        Self {
            url: format!("ws://{addr}"),
            frames: Some(tx),
            connections,
            saw_bearer,
        }
    }

    fn send(&self, frame: &[u8]) {
        self.frames
            .as_ref()
            .expect("upstream already closed")
            .send(frame.to_vec())
            .unwrap();
    }

    fn close(&mut self) {
        self.frames.take();
    }

    fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Fake Feed-Authorization Endpoint
// =============================================================================

#[derive(Clone)]
struct FeedAuthState {
    calls: Arc<AtomicUsize>,
    upstream_urls: Arc<Mutex<VecDeque<String>>>,
}

async fn feed_auth_endpoint(
    State(state): State<FeedAuthState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.calls.fetch_add(1, Ordering::SeqCst);

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(&format!("Bearer {GOOD_TOKEN}"));

    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "invalid token"})),
        );
    }

    let url = state
        .upstream_urls
        .lock()
        .pop_front()
        .expect("no upstream URL queued for this authorization");
    (StatusCode::OK, Json(serde_json::json!({"data": url})))
}

/// Serve the feed-authorization endpoint; each successful call hands out the
/// next queued upstream URL.
async fn serve_feed_auth(urls: Vec<String>) -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let state = FeedAuthState {
        calls: Arc::clone(&calls),
        upstream_urls: Arc::new(Mutex::new(urls.into_iter().collect())),
    };

    let app = Router::new()
        .route("/feed/authorize", get(feed_auth_endpoint))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/feed/authorize"), calls)
}

// =============================================================================
// Bridge Under Test
// =============================================================================

struct Bridge {
    addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    signals: Arc<SignalHub>,
    #[allow(dead_code)]
    shutdown: CancellationToken,
}

async fn start_bridge(feed_auth_url: &str) -> Bridge {
    let catalog = Arc::new(
        CatalogClient::new(
            "http://127.0.0.1:9/unused.json.gz".to_string(),
            Duration::from_secs(1),
        )
        .unwrap(),
    );
    let contracts = Arc::new(ContractCache::new(
        catalog as Arc<dyn CatalogSource>,
        ContractTarget::new("BANKNIFTY".to_string(), "2025-04".to_string()),
    ));
    let tokens = Arc::new(
        TokenClient::new(
            "http://127.0.0.1:9/unused".to_string(),
            Duration::from_secs(1),
            UpstoxCredentials::new(None, None, None),
        )
        .unwrap(),
    );
    let feed_auth = Arc::new(
        FeedAuthClient::new(feed_auth_url.to_string(), Duration::from_secs(5)).unwrap(),
    );

    let signals = Arc::new(SignalHub::new(16));
    let registry = Arc::new(SessionRegistry::new());
    let shutdown = CancellationToken::new();

    let state = ApiState {
        contracts,
        tokens,
        relay: RelayContext {
            feed_auth,
            connector: UpstreamConnector::new(),
            signals: Arc::clone(&signals),
            registry: Arc::clone(&registry),
            shutdown: shutdown.clone(),
        },
    };

    let app = router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Bridge {
        addr,
        registry,
        signals,
        shutdown,
    }
}

async fn connect_client(bridge: &Bridge, token: &str) -> WsClient {
    let url = format!("ws://{}/ws?token={token}", bridge.addr);
    let (client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    client
}

async fn next_binary(client: &mut WsClient) -> Vec<u8> {
    loop {
        let message = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a binary frame")
            .expect("stream ended while waiting for a binary frame")
            .unwrap();
        match message {
            Message::Binary(bytes) => return bytes.to_vec(),
            Message::Text(_) | Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected message: {other:?}"),
        }
    }
}

async fn next_text(client: &mut WsClient) -> String {
    loop {
        let message = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a text frame")
            .expect("stream ended while waiting for a text frame")
            .unwrap();
        match message {
            Message::Text(text) => return text.to_string(),
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected message: {other:?}"),
        }
    }
}

async fn wait_for_active_sessions(registry: &SessionRegistry, expected: usize) {
    for _ in 0..250 {
        if registry.active() == expected {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "registry never reached {expected} active sessions (now {})",
        registry.active()
    );
}

async fn wait_for_signal_receivers(signals: &SignalHub, expected: usize) {
    for _ in 0..250 {
        if signals.receiver_count() >= expected {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "hub never reached {expected} signal receivers (now {})",
        signals.receiver_count()
    );
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn missing_token_is_rejected_before_any_upstream_call() {
    let (feed_auth_url, auth_calls) = serve_feed_auth(vec![]).await;
    let bridge = start_bridge(&feed_auth_url).await;

    let url = format!("ws://{}/ws", bridge.addr);
    let err = tokio_tungstenite::connect_async(url).await.unwrap_err();

    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        other => panic!("expected HTTP rejection, got {other:?}"),
    }

    assert_eq!(auth_calls.load(Ordering::SeqCst), 0);
    assert_eq!(bridge.registry.opened_total(), 0);
}

#[tokio::test]
async fn rejected_authorization_closes_the_session_without_upstream_contact() {
    let (feed_auth_url, auth_calls) = serve_feed_auth(vec![]).await;
    let bridge = start_bridge(&feed_auth_url).await;
    let upstream = FakeUpstream::spawn().await;

    let mut client = connect_client(&bridge, "expired-token").await;

    // The session closes with a policy close frame; the upstream socket is
    // never dialed.
    let message = timeout(Duration::from_secs(5), client.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    match message {
        Message::Close(Some(frame)) => {
            assert!(frame.reason.contains("authorization"));
        }
        other => panic!("expected close frame, got {other:?}"),
    }

    assert_eq!(auth_calls.load(Ordering::SeqCst), 1);
    assert_eq!(upstream.connection_count(), 0);
    wait_for_active_sessions(&bridge.registry, 0).await;
}

#[tokio::test]
async fn frames_are_forwarded_byte_for_byte() {
    let upstream = FakeUpstream::spawn().await;
    let (feed_auth_url, _calls) = serve_feed_auth(vec![upstream.url.clone()]).await;
    let bridge = start_bridge(&feed_auth_url).await;

    let mut client = connect_client(&bridge, GOOD_TOKEN).await;
    wait_for_active_sessions(&bridge.registry, 1).await;

    let frames: [&[u8]; 3] = [b"\x01\x02\x03", b"ltp:48251.25", b"\x00"];
    for frame in frames {
        upstream.send(frame);
    }
    for frame in frames {
        assert_eq!(next_binary(&mut client).await, frame);
    }

    // The upstream handshake carried the bearer token.
    assert!(upstream.saw_bearer.load(Ordering::SeqCst));
    assert_eq!(upstream.connection_count(), 1);
}

#[tokio::test]
async fn closing_one_upstream_tears_down_only_that_session() {
    let mut upstream_a = FakeUpstream::spawn().await;
    let upstream_b = FakeUpstream::spawn().await;
    let (feed_auth_url, _calls) =
        serve_feed_auth(vec![upstream_a.url.clone(), upstream_b.url.clone()]).await;
    let bridge = start_bridge(&feed_auth_url).await;

    let mut client_a = connect_client(&bridge, GOOD_TOKEN).await;
    wait_for_active_sessions(&bridge.registry, 1).await;
    let mut client_b = connect_client(&bridge, GOOD_TOKEN).await;
    wait_for_active_sessions(&bridge.registry, 2).await;

    upstream_a.send(b"frame-for-a");
    upstream_b.send(b"frame-for-b");
    assert_eq!(next_binary(&mut client_a).await, b"frame-for-a");
    assert_eq!(next_binary(&mut client_b).await, b"frame-for-b");

    // Upstream A closes; only session A dies.
    upstream_a.close();
    wait_for_active_sessions(&bridge.registry, 1).await;

    let ended = timeout(Duration::from_secs(5), async {
        loop {
            match client_a.next().await {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "client A never observed its session closing");

    // Session B keeps streaming.
    upstream_b.send(b"b-still-alive");
    assert_eq!(next_binary(&mut client_b).await, b"b-still-alive");
    assert_eq!(bridge.registry.active(), 1);
}

#[tokio::test]
async fn signals_fan_out_to_every_connected_client() {
    let upstream_a = FakeUpstream::spawn().await;
    let upstream_b = FakeUpstream::spawn().await;
    let (feed_auth_url, _calls) =
        serve_feed_auth(vec![upstream_a.url.clone(), upstream_b.url.clone()]).await;
    let bridge = start_bridge(&feed_auth_url).await;

    let mut client_a = connect_client(&bridge, GOOD_TOKEN).await;
    let mut client_b = connect_client(&bridge, GOOD_TOKEN).await;
    wait_for_signal_receivers(&bridge.signals, 2).await;

    let reached = bridge.signals.publish(Signal::placeholder());
    assert_eq!(reached, 2);

    for client in [&mut client_a, &mut client_b] {
        let text = next_text(client).await;
        let event: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(event["event"], "signal");
        assert_eq!(event["data"]["action"], "HOLD");
    }
}

#[tokio::test]
async fn client_disconnect_closes_its_upstream_session() {
    let upstream = FakeUpstream::spawn().await;
    let (feed_auth_url, _calls) = serve_feed_auth(vec![upstream.url.clone()]).await;
    let bridge = start_bridge(&feed_auth_url).await;

    let mut client = connect_client(&bridge, GOOD_TOKEN).await;
    wait_for_active_sessions(&bridge.registry, 1).await;

    client.close(None).await.unwrap();
    wait_for_active_sessions(&bridge.registry, 0).await;
    assert_eq!(bridge.registry.opened_total(), 1);
}
