//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Upstox client adapters (catalog, credentials, feed authorization).
pub mod upstox;

/// Per-client relay sessions.
pub mod relay;

/// Signal broadcast hub.
pub mod broadcast;

/// Fixed-cadence signal scheduler.
pub mod scheduler;

/// HTTP API and WebSocket entry.
pub mod http;

/// Configuration and dependency injection.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
