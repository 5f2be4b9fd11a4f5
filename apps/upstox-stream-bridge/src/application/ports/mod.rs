//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`CatalogSource`]: one-shot fetch of the full instrument catalog

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::instrument::Catalog;

/// Failure while fetching or decoding the instrument catalog.
///
/// Every variant leaves the process-wide catalog cache empty, so a later
/// call may retry the fetch.
#[derive(Debug, Clone, Error)]
pub enum CatalogFetchError {
    /// The catalog endpoint could not be reached.
    #[error("catalog request failed: {0}")]
    Network(String),

    /// The catalog endpoint answered with a non-success status.
    #[error("catalog endpoint returned status {0}")]
    Status(u16),

    /// The gzip payload could not be decompressed.
    #[error("catalog decompression failed: {0}")]
    Decompress(String),

    /// The decompressed payload is not a valid instrument array.
    #[error("catalog parse failed: {0}")]
    Parse(String),
}

/// Source of the daily instrument catalog.
///
/// Implementations perform exactly one fetch per call and never cache;
/// process-lifetime caching and single-flight coalescing live in
/// [`crate::application::services::ContractCache`].
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch, decompress, and parse the full catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogFetchError`] on network, decompression, or parse
    /// failure.
    async fn fetch(&self) -> Result<Catalog, CatalogFetchError>;
}
