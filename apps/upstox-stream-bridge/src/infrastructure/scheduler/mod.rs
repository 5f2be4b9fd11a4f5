//! Signal Scheduler
//!
//! A single long-lived loop that wakes on a fixed interval and publishes
//! the current trading signal to all connected clients. Each wait is
//! measured from the end of the previous tick -- there is deliberately no
//! drift correction toward an absolute schedule.
//!
//! A failing tick is logged and the loop moves on; only the process
//! shutdown token ends it. Indicator computation plugs into `tick()` when
//! it exists; until then the placeholder signal is broadcast.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::signal::Signal;
use crate::infrastructure::broadcast::SignalHub;
use crate::infrastructure::metrics;

/// Failure while publishing a signal to clients.
#[derive(Debug, Clone, Error)]
#[error("signal publish failed: {0}")]
pub struct PublishError(
    /// Why delivery failed.
    pub String,
);

/// Outbound publish channel the scheduler owns.
#[cfg_attr(test, mockall::automock)]
pub trait SignalPublisher: Send + Sync {
    /// Publish one signal; returns the number of receivers reached.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] when the signal cannot be delivered.
    fn publish(&self, signal: Signal) -> Result<usize, PublishError>;
}

impl SignalPublisher for SignalHub {
    fn publish(&self, signal: Signal) -> Result<usize, PublishError> {
        // Zero receivers just means nobody is connected right now.
        Ok(Self::publish(self, signal))
    }
}

/// Fixed-cadence background signal loop.
pub struct SignalScheduler {
    interval: Duration,
    publisher: Arc<dyn SignalPublisher>,
    cancel: CancellationToken,
}

impl SignalScheduler {
    /// Create a scheduler publishing on the given cadence.
    #[must_use]
    pub fn new(
        interval: Duration,
        publisher: Arc<dyn SignalPublisher>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            interval,
            publisher,
            cancel,
        }
    }

    /// Run until the shutdown token fires.
    ///
    /// Tick failures are logged and counted; they never terminate the loop.
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Signal scheduler started"
        );

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }

            match self.tick() {
                Ok(receivers) => {
                    metrics::record_signal_tick(true);
                    tracing::debug!(receivers, "Signal tick published");
                }
                Err(e) => {
                    metrics::record_signal_tick(false);
                    tracing::error!(error = %e, "Signal tick failed; continuing");
                }
            }
        }

        tracing::info!("Signal scheduler stopped");
    }

    /// One tick: publish the current signal.
    ///
    /// This is the future home of indicator computation; today it emits the
    /// placeholder.
    fn tick(&self) -> Result<usize, PublishError> {
        self.publisher.publish(Signal::placeholder())
    }
}

impl std::fmt::Debug for SignalScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalScheduler")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
