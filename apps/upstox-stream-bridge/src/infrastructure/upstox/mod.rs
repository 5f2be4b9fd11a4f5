//! Upstox Adapters
//!
//! Concrete clients for the three Upstox upstream interfaces:
//!
//! - **catalog**: gzip-compressed JSON instrument catalog (HTTP GET)
//! - **credentials**: OAuth authorization-code exchange (form-encoded POST)
//! - **`feed_auth`** / **upstream**: feed-authorization handshake and the
//!   per-client upstream WebSocket it unlocks

pub mod catalog;
pub mod credentials;
pub mod feed_auth;
pub mod upstream;

pub use catalog::CatalogClient;
pub use credentials::{TokenClient, TokenExchangeError};
pub use feed_auth::{FeedAuthClient, FeedAuthError};
pub use upstream::{UpstreamConnectError, UpstreamConnector, UpstreamSocket};

/// Opaque bearer access token.
///
/// No expiry tracking, never persisted; the bridge holds one only for the
/// lifetime of the call or session it authorizes. `Debug` and `Display`
/// redact the value so it cannot reach logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a non-empty token string; `None` when blank.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() { None } else { Some(Self(raw)) }
    }

    /// The raw token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value for upstream calls.
    #[must_use]
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

impl std::fmt::Display for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}
