//! Feed Authorization Client
//!
//! Negotiates the upstream feed-authorization handshake: a bearer GET that
//! answers with the one-time WebSocket URL a single relay session may
//! connect to. Each client session performs its own handshake; the URL is
//! never shared or reused.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::AccessToken;

/// Failure during the feed-authorization handshake.
#[derive(Debug, Error)]
pub enum FeedAuthError {
    /// The authorization endpoint could not be reached.
    #[error("feed authorization request failed: {0}")]
    Transport(String),

    /// The authorization endpoint answered with a non-success status.
    #[error("feed authorization returned status {status}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// A success response without a usable socket URL in `data`.
    #[error("feed authorization response missing socket URL")]
    MissingUrl,
}

/// Response body of a successful feed authorization.
#[derive(Debug, Deserialize)]
struct FeedAuthResponse {
    #[serde(default)]
    data: Option<String>,
}

/// HTTP client for the feed-authorization endpoint.
#[derive(Debug, Clone)]
pub struct FeedAuthClient {
    http: reqwest::Client,
    url: String,
}

impl FeedAuthClient {
    /// Create a client for the given authorization URL with a bounded
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest` error when the HTTP client cannot
    /// be constructed.
    pub fn new(url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url })
    }

    /// Obtain the one-time upstream socket URL for this bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`FeedAuthError`] on transport failure, non-success status,
    /// or a response without a socket URL.
    pub async fn authorize(&self, token: &AccessToken) -> Result<String, FeedAuthError> {
        let response = self
            .http
            .get(&self.url)
            .header(reqwest::header::AUTHORIZATION, token.bearer_header())
            .send()
            .await
            .map_err(|e| FeedAuthError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FeedAuthError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(FeedAuthError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: FeedAuthResponse =
            serde_json::from_str(&body).map_err(|_| FeedAuthError::MissingUrl)?;

        parsed
            .data
            .filter(|url| !url.is_empty())
            .ok_or(FeedAuthError::MissingUrl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_with_data_url_parses() {
        let parsed: FeedAuthResponse =
            serde_json::from_str(r#"{"data":"wss://feed.example/stream"}"#).unwrap();
        assert_eq!(parsed.data.as_deref(), Some("wss://feed.example/stream"));
    }

    #[test]
    fn response_without_data_field_parses_to_none() {
        let parsed: FeedAuthResponse = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        assert!(parsed.data.is_none());
    }
}
