//! Upstox Stream Bridge Binary
//!
//! Starts the market data feed bridge.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin upstox-stream-bridge
//! ```
//!
//! # Environment Variables
//!
//! ## Credentials (required for `POST /api/token` only)
//! - `UPSTOX_CLIENT_ID`: Upstox application client id
//! - `UPSTOX_CLIENT_SECRET`: Upstox application client secret
//! - `UPSTOX_REDIRECT_URI`: OAuth redirect URI registered with Upstox
//!
//! ## Optional
//! - `BRIDGE_TARGET_UNDERLYING`: underlying to resolve (default: BANKNIFTY)
//! - `BRIDGE_TARGET_EXPIRY_MONTH`: target month YYYY-MM (default: current month)
//! - `BRIDGE_API_PORT`: API + WebSocket port (default: 8000)
//! - `BRIDGE_HEALTH_PORT`: Health check HTTP port (default: 8082)
//! - `BRIDGE_CATALOG_URL` / `BRIDGE_TOKEN_URL` / `BRIDGE_FEED_AUTH_URL`: endpoint overrides
//! - `BRIDGE_CATALOG_TIMEOUT_SECS` / `BRIDGE_TOKEN_TIMEOUT_SECS` / `BRIDGE_FEED_AUTH_TIMEOUT_SECS`
//! - `BRIDGE_SIGNAL_INTERVAL_SECS`: scheduler cadence (default: 60)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: upstox-stream-bridge)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use upstox_stream_bridge::infrastructure::telemetry;
use upstox_stream_bridge::{
    ApiServer, ApiState, BridgeConfig, CatalogClient, CatalogSource, ContractCache, FeedAuthClient,
    HealthServer, HealthServerState, RelayContext, SessionRegistry, SignalHub, SignalPublisher,
    SignalScheduler, TokenClient, UpstreamConnector, init_metrics,
};

#[tokio::main]
#[allow(clippy::expect_used)]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Upstox Stream Bridge");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = BridgeConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Upstream clients
    let catalog_client = Arc::new(CatalogClient::new(
        config.endpoints.catalog_url.clone(),
        config.timeouts.catalog,
    )?);
    let tokens = Arc::new(TokenClient::new(
        config.endpoints.token_url.clone(),
        config.timeouts.token,
        config.credentials.clone(),
    )?);
    let feed_auth = Arc::new(FeedAuthClient::new(
        config.endpoints.feed_auth_url.clone(),
        config.timeouts.feed_auth,
    )?);

    // Process-wide catalog/contract cache (single-flight, lazy)
    let contracts = Arc::new(ContractCache::new(
        Arc::clone(&catalog_client) as Arc<dyn CatalogSource>,
        config.target.clone(),
    ));

    // Signal fan-out and session bookkeeping
    let signals = Arc::new(SignalHub::new(config.scheduler.channel_capacity));
    let registry = Arc::new(SessionRegistry::new());

    let relay_ctx = RelayContext {
        feed_auth,
        connector: UpstreamConnector::new(),
        signals: Arc::clone(&signals),
        registry: Arc::clone(&registry),
        shutdown: shutdown_token.clone(),
    };

    // API server (JSON endpoints + WebSocket relay)
    let api_ready = Arc::new(AtomicBool::new(false));
    let api_state = ApiState {
        contracts: Arc::clone(&contracts),
        tokens,
        relay: relay_ctx,
    };
    let api_server = ApiServer::new(
        config.server.api_port,
        api_state,
        Arc::clone(&api_ready),
        shutdown_token.clone(),
    );

    // Health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&api_ready),
        Arc::clone(&contracts),
        Arc::clone(&registry),
        Arc::clone(&signals),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );

    // Signal scheduler
    let scheduler = SignalScheduler::new(
        config.scheduler.tick_interval,
        Arc::clone(&signals) as Arc<dyn SignalPublisher>,
        shutdown_token.clone(),
    );

    tokio::spawn(async move {
        scheduler.run().await;
    });

    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    tokio::spawn(async move {
        if let Err(e) = api_server.run().await {
            tracing::error!(error = %e, "API server error");
        }
    });

    tracing::info!("Stream bridge ready");

    await_shutdown(shutdown_token).await;

    tracing::info!("Stream bridge stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &BridgeConfig) {
    tracing::info!(
        underlying = %config.target.underlying,
        expiry_month = %config.target.expiry_month,
        api_port = config.server.api_port,
        health_port = config.server.health_port,
        signal_interval_secs = config.scheduler.tick_interval.as_secs(),
        "Configuration loaded"
    );
    tracing::debug!(
        catalog_url = %config.endpoints.catalog_url,
        token_url = %config.endpoints.token_url,
        feed_auth_url = %config.endpoints.feed_auth_url,
        "Upstream endpoints"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!("Graceful shutdown started");
}
