//! Catalog Client
//!
//! Fetches the daily instrument catalog: one HTTP GET returning a
//! gzip-compressed JSON array of flat instrument records. The client never
//! caches and never retries; process-lifetime caching lives in
//! [`crate::application::services::ContractCache`].

use std::io::Read;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use flate2::read::GzDecoder;

use crate::application::ports::{CatalogFetchError, CatalogSource};
use crate::domain::instrument::Catalog;
use crate::infrastructure::metrics;

/// HTTP client for the instrument catalog endpoint.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    url: String,
}

impl CatalogClient {
    /// Create a client for the given catalog URL with a bounded timeout.
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest` error when the HTTP client cannot
    /// be constructed.
    pub fn new(url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url })
    }

    /// The catalog URL this client fetches.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CatalogSource for CatalogClient {
    async fn fetch(&self) -> Result<Catalog, CatalogFetchError> {
        let started = Instant::now();
        tracing::info!(url = %self.url, "Fetching instrument catalog");

        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CatalogFetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogFetchError::Status(status.as_u16()));
        }

        let compressed = response
            .bytes()
            .await
            .map_err(|e| CatalogFetchError::Network(e.to_string()))?;

        let decompressed = decompress_gzip(&compressed)?;

        let catalog = Catalog::from_json_slice(&decompressed)
            .map_err(|e| CatalogFetchError::Parse(e.to_string()))?;

        metrics::record_catalog_fetch(catalog.len(), started.elapsed());
        tracing::info!(
            instruments = catalog.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Instrument catalog fetched"
        );

        Ok(catalog)
    }
}

/// Inflate a gzip payload into raw bytes.
fn decompress_gzip(compressed: &[u8]) -> Result<Vec<u8>, CatalogFetchError> {
    let mut decoder = GzDecoder::new(compressed);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| CatalogFetchError::Decompress(e.to_string()))?;
    Ok(decompressed)
}
