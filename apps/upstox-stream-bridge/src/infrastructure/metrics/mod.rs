//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Catalog**: fetch duration and catalog size
//! - **Sessions**: relay session counts and forwarded frames
//! - **Signals**: scheduler tick outcomes
//! - **Tokens**: credential exchange outcomes
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Catalog
    describe_histogram!(
        "bridge_catalog_fetch_seconds",
        "Time to fetch, decompress, and parse the instrument catalog"
    );
    describe_gauge!(
        "bridge_catalog_instruments",
        "Number of instruments in the cached catalog"
    );

    // Relay sessions
    describe_gauge!(
        "bridge_relay_sessions_active",
        "Relay sessions currently open"
    );
    describe_counter!(
        "bridge_relay_sessions_total",
        "Relay sessions opened since start"
    );
    describe_counter!(
        "bridge_relay_frames_forwarded_total",
        "Upstream feed frames forwarded to clients"
    );

    // Signal scheduler
    describe_counter!(
        "bridge_signal_ticks_total",
        "Scheduler ticks by outcome"
    );

    // Credential broker
    describe_counter!(
        "bridge_token_exchanges_total",
        "Authorization-code exchanges by outcome"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a completed catalog fetch.
pub fn record_catalog_fetch(instruments: usize, duration: Duration) {
    histogram!("bridge_catalog_fetch_seconds").record(duration.as_secs_f64());
    #[allow(clippy::cast_precision_loss)]
    gauge!("bridge_catalog_instruments").set(instruments as f64);
}

/// Record a relay session opening.
pub fn record_session_opened() {
    gauge!("bridge_relay_sessions_active").increment(1.0);
    counter!("bridge_relay_sessions_total").increment(1);
}

/// Record a relay session closing.
pub fn record_session_closed() {
    gauge!("bridge_relay_sessions_active").decrement(1.0);
}

/// Record one forwarded feed frame.
pub fn record_frame_forwarded() {
    counter!("bridge_relay_frames_forwarded_total").increment(1);
}

/// Record a scheduler tick outcome.
pub fn record_signal_tick(success: bool) {
    let outcome = if success { "ok" } else { "error" };
    counter!("bridge_signal_ticks_total", "outcome" => outcome).increment(1);
}

/// Record a token exchange outcome.
pub fn record_token_exchange(outcome: &'static str) {
    counter!("bridge_token_exchanges_total", "outcome" => outcome).increment(1);
}
