//! Signal Broadcast Hub
//!
//! Fan-out of scheduler-emitted signals to connected relay sessions using a
//! tokio broadcast channel. The scheduler owns the send side; every session
//! subscribes on entry to its streaming phase. Feed frames never travel
//! through this hub -- they stay on their session's dedicated path.

use tokio::sync::broadcast;

use crate::domain::signal::Signal;

/// Central broadcast channel for trading signals.
#[derive(Debug)]
pub struct SignalHub {
    tx: broadcast::Sender<Signal>,
}

impl SignalHub {
    /// Create a hub with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            tx: broadcast::channel(capacity).0,
        }
    }

    /// Send a signal to all subscribed sessions.
    ///
    /// Returns the number of receivers the signal reached; zero when no
    /// client is connected, which is not a failure.
    pub fn publish(&self, signal: Signal) -> usize {
        self.tx.send(signal).unwrap_or(0)
    }

    /// Get a new receiver for signals.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_reaches_nobody() {
        let hub = SignalHub::new(8);
        assert_eq!(hub.publish(Signal::placeholder()), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_published_signals() {
        let hub = SignalHub::new(8);
        let mut rx_a = hub.subscribe();
        let mut rx_b = hub.subscribe();

        assert_eq!(hub.publish(Signal::placeholder()), 2);
        assert_eq!(rx_a.recv().await.unwrap(), Signal::placeholder());
        assert_eq!(rx_b.recv().await.unwrap(), Signal::placeholder());
    }

    #[tokio::test]
    async fn dropping_a_receiver_updates_the_count() {
        let hub = SignalHub::new(8);
        let rx = hub.subscribe();
        assert_eq!(hub.receiver_count(), 1);
        drop(rx);
        assert_eq!(hub.receiver_count(), 0);
    }
}
