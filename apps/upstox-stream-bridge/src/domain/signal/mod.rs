//! Trading Signal Types
//!
//! The ephemeral payload broadcast to connected clients on every scheduler
//! tick, and the named push envelope it travels in. Signals are not
//! persisted; a client that misses one simply waits for the next tick.
//!
//! Indicator computation is out of scope here: the scheduler publishes a
//! placeholder until a real strategy is plugged into its tick.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trading action attached to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    /// No position change recommended.
    #[default]
    Hold,
    /// Enter or add to a long position.
    Buy,
    /// Enter or add to a short position.
    Sell,
}

/// A broadcast trading signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    /// Recommended action.
    pub action: SignalAction,
    /// Target price for the action.
    pub target: Decimal,
    /// Stop-loss price for the action.
    pub stop_loss: Decimal,
}

impl Signal {
    /// The canned placeholder emitted until indicator computation exists.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            action: SignalAction::Hold,
            target: Decimal::ZERO,
            stop_loss: Decimal::ZERO,
        }
    }
}

/// Named push event delivered to a downstream client as JSON text.
///
/// Feed frames are forwarded verbatim as binary messages and never pass
/// through this envelope; only bridge-originated payloads do, so browsers
/// can route them by `event` name.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum PushEvent {
    /// A scheduler-emitted trading signal.
    Signal(Signal),
}
