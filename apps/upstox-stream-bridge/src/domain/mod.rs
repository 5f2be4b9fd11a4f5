//! Domain Layer - Core bridge types and business logic.
//!
//! This layer contains the pure domain logic of the bridge with no I/O:
//! catalog parsing and contract selection, the relay session lifecycle,
//! and signal payloads.

/// Instrument catalog, contract selection, symbol canonicalization.
pub mod instrument;

/// Relay session lifecycle state machine.
pub mod relay;

/// Trading signal payloads and the push event envelope.
pub mod signal;
