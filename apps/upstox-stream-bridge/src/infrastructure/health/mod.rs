//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, bridge status reporting, and Prometheus
//! metrics. Used by container orchestrators, load balancers, and monitoring
//! systems.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (checks the API listener)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::ContractCache;
use crate::infrastructure::broadcast::SignalHub;
use crate::infrastructure::metrics::get_metrics_handle;
use crate::infrastructure::relay::SessionRegistry;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy" or "unhealthy".
    pub status: HealthStatus,
    /// Bridge version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Catalog cache status.
    pub catalog: CatalogStatus,
    /// Relay session status.
    pub relay: RelayStatus,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// The API listener is accepting connections.
    Healthy,
    /// The API listener is not up.
    Unhealthy,
}

/// Catalog cache status.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStatus {
    /// Whether the catalog has been fetched this process lifetime.
    pub loaded: bool,
    /// Instruments in the cached catalog (0 until loaded).
    pub instruments: usize,
    /// Whether the target contract was found in the catalog.
    pub contract_resolved: bool,
}

/// Relay session status.
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatus {
    /// Sessions currently open.
    pub active_sessions: usize,
    /// Sessions opened since start.
    pub sessions_total: u64,
    /// Live signal subscribers.
    pub signal_receivers: usize,
    /// Failure that ended the most recent session, if any.
    pub last_error: Option<String>,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    api_ready: Arc<AtomicBool>,
    contracts: Arc<ContractCache>,
    registry: Arc<SessionRegistry>,
    signals: Arc<SignalHub>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(
        version: String,
        api_ready: Arc<AtomicBool>,
        contracts: Arc<ContractCache>,
        registry: Arc<SessionRegistry>,
        signals: Arc<SignalHub>,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            api_ready,
            contracts,
            registry,
            signals,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

/// Health server error.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind the listener.
    #[error("failed to bind health port {0}: {1}")]
    BindFailed(u16, String),
    /// Server failed while running.
    #[error("health server failed: {0}")]
    ServerFailed(String),
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.api_ready.load(Ordering::Acquire) {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "metrics recorder not installed".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4")],
                handle.render(),
            )
        },
    )
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let snapshot = state.contracts.snapshot();
    let catalog = CatalogStatus {
        loaded: snapshot.is_some(),
        instruments: snapshot.map_or(0, |s| s.catalog.len()),
        contract_resolved: snapshot.is_some_and(|s| s.contract.is_some()),
    };

    let relay = RelayStatus {
        active_sessions: state.registry.active(),
        sessions_total: state.registry.opened_total(),
        signal_receivers: state.signals.receiver_count(),
        last_error: state.registry.last_error(),
    };

    let status = if state.api_ready.load(Ordering::Acquire) {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    };

    HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        catalog,
        relay,
    }
}
