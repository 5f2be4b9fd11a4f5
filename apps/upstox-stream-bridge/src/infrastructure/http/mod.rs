//! HTTP API and WebSocket Entry
//!
//! The caller-facing transport binding: a small JSON API over the core
//! operations plus the WebSocket upgrade into a relay session.
//!
//! # Endpoints
//!
//! - `GET /api/contract` - resolved target contract (or an empty answer)
//! - `POST /api/token` - exchange an authorization code for a bearer token
//! - `GET /ws?token=...` - open a relay session
//!
//! Error responses carry a stable `kind` discriminator so browser callers
//! can distinguish bad input from upstream failures.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::application::ports::CatalogFetchError;
use crate::application::services::ContractCache;
use crate::domain::instrument::ResolvedContract;
use crate::infrastructure::relay::{self, RelayContext};
use crate::infrastructure::upstox::{AccessToken, TokenClient, TokenExchangeError};

// =============================================================================
// API Error
// =============================================================================

/// JSON error answer with a stable kind discriminator.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    /// Bad caller input.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "validation",
            message: message.into(),
        }
    }

    /// The error kind exposed to callers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }
}

impl From<TokenExchangeError> for ApiError {
    fn from(err: TokenExchangeError) -> Self {
        let (status, kind) = match &err {
            TokenExchangeError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            TokenExchangeError::Configuration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration")
            }
            TokenExchangeError::Transport(_) | TokenExchangeError::Upstream { .. } => {
                (StatusCode::BAD_GATEWAY, "upstream")
            }
            TokenExchangeError::ResponseFormat(_) => (StatusCode::BAD_GATEWAY, "response_format"),
        };
        Self {
            status,
            kind,
            message: err.to_string(),
        }
    }
}

impl From<CatalogFetchError> for ApiError {
    fn from(err: CatalogFetchError) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            kind: "catalog_fetch",
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

// =============================================================================
// API State and Router
// =============================================================================

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    /// Process-wide catalog/contract cache.
    pub contracts: Arc<ContractCache>,
    /// Credential broker.
    pub tokens: Arc<TokenClient>,
    /// Dependencies for relay sessions.
    pub relay: RelayContext,
}

/// Build the API router.
#[must_use]
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/contract", get(contract_handler))
        .route("/api/token", post(token_handler))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

/// Resolved-contract answer; `found: false` when the catalog has no match.
#[derive(Debug, Serialize)]
struct ContractResponse {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    instrument_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trading_symbol: Option<String>,
}

impl From<Option<ResolvedContract>> for ContractResponse {
    fn from(contract: Option<ResolvedContract>) -> Self {
        contract.map_or(
            Self {
                found: false,
                instrument_key: None,
                trading_symbol: None,
            },
            |c| Self {
                found: true,
                instrument_key: Some(c.instrument_key),
                trading_symbol: Some(c.trading_symbol),
            },
        )
    }
}

async fn contract_handler(
    State(state): State<ApiState>,
) -> Result<Json<ContractResponse>, ApiError> {
    let snapshot = state.contracts.resolve().await?;
    Ok(Json(ContractResponse::from(snapshot.contract.clone())))
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    #[serde(default)]
    code: String,
}

#[derive(Debug, Serialize)]
struct TokenGrant {
    access_token: String,
}

async fn token_handler(
    State(state): State<ApiState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TokenGrant>, ApiError> {
    let token = state.tokens.exchange_code(&request.code).await?;
    Ok(Json(TokenGrant {
        access_token: token.as_str().to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct WsParams {
    #[serde(default)]
    token: Option<String>,
}

/// Upgrade into a relay session.
///
/// A missing or blank token is rejected here, before the upgrade and
/// before any upstream contact.
async fn ws_handler(
    State(state): State<ApiState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = params.token.and_then(AccessToken::new) else {
        return ApiError::validation("missing bearer token").into_response();
    };

    let ctx = state.relay.clone();
    ws.on_upgrade(move |socket| relay::run_session(socket, token, ctx))
}

// =============================================================================
// API Server
// =============================================================================

/// API server error.
#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
    /// Failed to bind the listener.
    #[error("failed to bind API port {0}: {1}")]
    BindFailed(u16, String),
    /// Server failed while running.
    #[error("API server failed: {0}")]
    ServerFailed(String),
}

/// HTTP server for the API and WebSocket relay.
pub struct ApiServer {
    port: u16,
    state: ApiState,
    ready: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl ApiServer {
    /// Create a new API server.
    #[must_use]
    pub const fn new(
        port: u16,
        state: ApiState,
        ready: Arc<AtomicBool>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            port,
            state,
            ready,
            cancel,
        }
    }

    /// Run the API server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ApiServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), ApiServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiServerError::BindFailed(self.port, e.to_string()))?;

        self.ready.store(true, Ordering::Release);
        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ApiServerError::ServerFailed(e.to_string()))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_errors_map_to_stable_kinds() {
        let cases: [(TokenExchangeError, StatusCode, &str); 4] = [
            (
                TokenExchangeError::Validation("empty"),
                StatusCode::BAD_REQUEST,
                "validation",
            ),
            (
                TokenExchangeError::Configuration("UPSTOX_CLIENT_SECRET"),
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration",
            ),
            (
                TokenExchangeError::Upstream {
                    status: 401,
                    body: "denied".to_string(),
                },
                StatusCode::BAD_GATEWAY,
                "upstream",
            ),
            (
                TokenExchangeError::ResponseFormat("no token".to_string()),
                StatusCode::BAD_GATEWAY,
                "response_format",
            ),
        ];

        for (err, status, kind) in cases {
            let api_err = ApiError::from(err);
            assert_eq!(api_err.status, status);
            assert_eq!(api_err.kind(), kind);
        }
    }

    #[test]
    fn catalog_errors_are_bad_gateway() {
        let api_err = ApiError::from(CatalogFetchError::Status(503));
        assert_eq!(api_err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(api_err.kind(), "catalog_fetch");
    }

    #[test]
    fn empty_contract_serializes_as_not_found() {
        let response = ContractResponse::from(None);
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"found":false}"#);
    }

    #[test]
    fn resolved_contract_serializes_with_both_fields() {
        let response = ContractResponse::from(Some(ResolvedContract {
            instrument_key: "NSE_FO|12345".to_string(),
            trading_symbol: "NSE_FO:BANKNIFTY25APRFUT".to_string(),
        }));
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""found":true"#));
        assert!(json.contains("NSE_FO|12345"));
        assert!(json.contains("NSE_FO:BANKNIFTY25APRFUT"));
    }
}
