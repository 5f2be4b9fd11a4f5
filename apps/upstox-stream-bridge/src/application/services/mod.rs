//! Application Services
//!
//! Process-lifetime catalog resolution. The catalog and the resolved target
//! contract are written once by the first successful fetch and are
//! immutable afterwards; every later caller reads the same snapshot without
//! locking.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::application::ports::{CatalogFetchError, CatalogSource};
use crate::domain::instrument::{Catalog, ContractTarget, ResolvedContract, select_contract};

/// Immutable result of the first successful catalog resolution.
#[derive(Debug, Clone)]
pub struct ContractSnapshot {
    /// The full catalog, in document order.
    pub catalog: Arc<Catalog>,
    /// The selected target contract; `None` when the catalog holds no
    /// matching record ("not found" is a valid outcome, not an error).
    pub contract: Option<ResolvedContract>,
}

/// Process-wide cache for the catalog and resolved contract.
///
/// First callers collapse into a single fetch: while one initialization is
/// in flight, concurrent callers wait on it instead of issuing their own.
/// A failed initialization leaves the cell empty, so a later call retries;
/// a successful one is permanent for the process lifetime.
pub struct ContractCache {
    source: Arc<dyn CatalogSource>,
    target: ContractTarget,
    cell: OnceCell<ContractSnapshot>,
}

impl ContractCache {
    /// Create an empty cache over the given catalog source and target.
    #[must_use]
    pub fn new(source: Arc<dyn CatalogSource>, target: ContractTarget) -> Self {
        Self {
            source,
            target,
            cell: OnceCell::new(),
        }
    }

    /// The target this cache resolves against.
    #[must_use]
    pub const fn target(&self) -> &ContractTarget {
        &self.target
    }

    /// Resolve the catalog and target contract, fetching at most once.
    ///
    /// Returns the cached snapshot immediately when present; otherwise
    /// performs the fetch under the once-cell's single-flight guarantee.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogFetchError`] when the fetch fails; the cache stays
    /// empty and the call is safe to retry.
    pub async fn resolve(&self) -> Result<&ContractSnapshot, CatalogFetchError> {
        self.cell
            .get_or_try_init(|| async {
                let catalog = self.source.fetch().await?;

                let contract = select_contract(&catalog, &self.target);
                match &contract {
                    Some(resolved) => {
                        tracing::info!(
                            instrument_key = %resolved.instrument_key,
                            symbol = %resolved.trading_symbol,
                            instruments = catalog.len(),
                            "Target contract resolved"
                        );
                    }
                    None => {
                        tracing::warn!(
                            underlying = %self.target.underlying,
                            expiry_month = %self.target.expiry_month,
                            instruments = catalog.len(),
                            "No catalog record matches the target contract"
                        );
                    }
                }

                Ok(ContractSnapshot {
                    catalog: Arc::new(catalog),
                    contract,
                })
            })
            .await
    }

    /// Peek at the snapshot without triggering a fetch.
    #[must_use]
    pub fn snapshot(&self) -> Option<&ContractSnapshot> {
        self.cell.get()
    }
}

impl std::fmt::Debug for ContractCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractCache")
            .field("target", &self.target)
            .field("populated", &self.cell.initialized())
            .finish_non_exhaustive()
    }
}
