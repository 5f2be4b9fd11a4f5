#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Upstox Stream Bridge - Market Data Relay
//!
//! An HTTP/WebSocket service that bridges Upstox's streaming market-data
//! feed to browser clients: it resolves the target derivative contract from
//! the daily instrument catalog, exchanges OAuth authorization codes for
//! bearer tokens, and opens one dedicated upstream feed socket per
//! connected client.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Pure bridge logic and data types
//!   - `instrument`: catalog parsing, contract selection, canonical symbols
//!   - `relay`: session lifecycle state machine
//!   - `signal`: broadcast signal payloads
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: catalog source interface
//!   - `services`: single-flight process-lifetime contract resolution
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `upstox`: catalog, token, and feed-authorization clients
//!   - `relay`: per-client forwarding sessions
//!   - `broadcast`/`scheduler`: signal fan-out and cadence
//!   - `http`/`health`: transport binding and probes
//!   - `config`/`metrics`/`telemetry`: ambient wiring
//!
//! # Data Flow
//!
//! ```text
//!                       ┌─────────────┐
//! Upstox feed WS ──────▶│  Session 1  │──▶ Client 1
//!                       └─────────────┘
//!                       ┌─────────────┐
//! Upstox feed WS ──────▶│  Session 2  │──▶ Client 2
//!                       └─────────────┘
//!        Scheduler ──▶ signal broadcast ──▶ every session
//! ```
//!
//! Every client owns its upstream socket; only scheduler signals fan out.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core bridge types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::instrument::{
    Catalog, ContractTarget, Instrument, ResolvedContract, canonicalize_symbol, select_contract,
};
pub use domain::relay::{SessionLifecycle, SessionPhase};
pub use domain::signal::{PushEvent, Signal, SignalAction};

// Application services
pub use application::ports::{CatalogFetchError, CatalogSource};
pub use application::services::{ContractCache, ContractSnapshot};

// Infrastructure config
pub use infrastructure::config::{
    BridgeConfig, ConfigError, EndpointSettings, SchedulerSettings, ServerSettings,
    TimeoutSettings, UpstoxCredentials,
};

// Upstox adapters
pub use infrastructure::upstox::{
    AccessToken, CatalogClient, FeedAuthClient, FeedAuthError, TokenClient, TokenExchangeError,
    UpstreamConnector,
};

// Relay and signals (for integration tests)
pub use infrastructure::broadcast::SignalHub;
pub use infrastructure::relay::{RelayContext, SessionRegistry};
pub use infrastructure::scheduler::{PublishError, SignalPublisher, SignalScheduler};

// HTTP servers
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};
pub use infrastructure::http::{ApiServer, ApiServerError, ApiState, router};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
