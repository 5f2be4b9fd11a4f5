//! Token Exchange Integration Tests
//!
//! Exercises the credential broker against a real local token endpoint and
//! verifies the exact form-encoded request it issues.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Form;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use upstox_stream_bridge::{TokenClient, TokenExchangeError, UpstoxCredentials};

// =============================================================================
// Test Token Endpoint
// =============================================================================

#[derive(Clone)]
struct TokenServerState {
    hits: Arc<AtomicUsize>,
    last_form: Arc<Mutex<Option<HashMap<String, String>>>>,
    status: StatusCode,
    body: &'static str,
}

async fn token_endpoint(
    State(state): State<TokenServerState>,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.last_form.lock() = Some(form);
    (
        state.status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        state.body,
    )
}

async fn serve_token_endpoint(
    status: StatusCode,
    body: &'static str,
) -> (String, Arc<AtomicUsize>, Arc<Mutex<Option<HashMap<String, String>>>>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let last_form = Arc::new(Mutex::new(None));
    let state = TokenServerState {
        hits: Arc::clone(&hits),
        last_form: Arc::clone(&last_form),
        status,
        body,
    };

    let app = Router::new()
        .route("/login/authorization/token", post(token_endpoint))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (
        format!("http://{addr}/login/authorization/token"),
        hits,
        last_form,
    )
}

fn credentials() -> UpstoxCredentials {
    UpstoxCredentials::new(
        Some("client-id-1".to_string()),
        Some("client-secret-1".to_string()),
        Some("https://localhost:3000/callback".to_string()),
    )
}

fn broker(url: &str) -> TokenClient {
    TokenClient::new(url.to_string(), Duration::from_secs(5), credentials()).unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn successful_exchange_returns_the_token() {
    let (url, hits, last_form) =
        serve_token_endpoint(StatusCode::OK, r#"{"access_token":"tok-abc123"}"#).await;

    let token = broker(&url).exchange_code("auth-code-42").await.unwrap();
    assert_eq!(token.as_str(), "tok-abc123");
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let form = last_form.lock().clone().unwrap();
    assert_eq!(form["code"], "auth-code-42");
    assert_eq!(form["client_id"], "client-id-1");
    assert_eq!(form["client_secret"], "client-secret-1");
    assert_eq!(form["redirect_uri"], "https://localhost:3000/callback");
    assert_eq!(form["grant_type"], "authorization_code");
}

#[tokio::test]
async fn unauthorized_response_is_an_upstream_error_with_status() {
    let (url, hits, _form) =
        serve_token_endpoint(StatusCode::UNAUTHORIZED, r#"{"error":"invalid_code"}"#).await;

    let err = broker(&url).exchange_code("bad-code").await.unwrap_err();
    match err {
        TokenExchangeError::Upstream { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("invalid_code"));
        }
        other => panic!("expected upstream error, got {other:?}"),
    }

    // Exactly one POST; the broker never retries.
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn success_without_access_token_is_a_response_format_error() {
    let (url, _hits, _form) =
        serve_token_endpoint(StatusCode::OK, r#"{"token_type":"bearer"}"#).await;

    let err = broker(&url).exchange_code("auth-code").await.unwrap_err();
    assert!(matches!(err, TokenExchangeError::ResponseFormat(_)));
}

#[tokio::test]
async fn success_with_empty_access_token_is_a_response_format_error() {
    let (url, _hits, _form) = serve_token_endpoint(StatusCode::OK, r#"{"access_token":""}"#).await;

    let err = broker(&url).exchange_code("auth-code").await.unwrap_err();
    assert!(matches!(err, TokenExchangeError::ResponseFormat(_)));
}

#[tokio::test]
async fn non_json_success_body_is_a_response_format_error() {
    let (url, _hits, _form) = serve_token_endpoint(StatusCode::OK, "<html>login</html>").await;

    let err = broker(&url).exchange_code("auth-code").await.unwrap_err();
    assert!(matches!(err, TokenExchangeError::ResponseFormat(_)));
}

#[tokio::test]
async fn empty_code_never_reaches_the_endpoint() {
    let (url, hits, _form) =
        serve_token_endpoint(StatusCode::OK, r#"{"access_token":"tok"}"#).await;

    let err = broker(&url).exchange_code("").await.unwrap_err();
    assert!(matches!(err, TokenExchangeError::Validation(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unconfigured_secret_never_reaches_the_endpoint() {
    let (url, hits, _form) =
        serve_token_endpoint(StatusCode::OK, r#"{"access_token":"tok"}"#).await;

    let partial = UpstoxCredentials::new(
        Some("client-id-1".to_string()),
        None,
        Some("https://localhost:3000/callback".to_string()),
    );
    let client = TokenClient::new(url, Duration::from_secs(5), partial).unwrap();

    let err = client.exchange_code("auth-code").await.unwrap_err();
    assert!(matches!(err, TokenExchangeError::Configuration(_)));
    // The secret value must never appear in the error text.
    assert!(!err.to_string().contains("client-secret"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
