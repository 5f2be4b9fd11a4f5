//! Credential Broker
//!
//! Exchanges an OAuth-style authorization code for a bearer access token:
//! exactly one form-encoded POST to the token endpoint, no retry. Failures
//! map onto a closed error set so the HTTP layer can answer with a stable
//! error kind, and no message ever carries a secret value.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::AccessToken;
use crate::infrastructure::config::UpstoxCredentials;
use crate::infrastructure::metrics;

/// Failure during the authorization-code exchange.
#[derive(Debug, Error)]
pub enum TokenExchangeError {
    /// Caller-supplied input was unusable.
    #[error("validation failed: {0}")]
    Validation(&'static str),

    /// A required credential setting is not configured. The message names
    /// the setting, never its value.
    #[error("missing required setting: {0}")]
    Configuration(&'static str),

    /// The token endpoint could not be reached.
    #[error("token request failed: {0}")]
    Transport(String),

    /// The token endpoint answered with a non-success status.
    #[error("token endpoint returned status {status}")]
    Upstream {
        /// HTTP status code from the broker.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// A success response that does not carry a usable token.
    #[error("token response malformed: {0}")]
    ResponseFormat(String),
}

/// Response body of a successful token exchange.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// HTTP client for the token endpoint.
pub struct TokenClient {
    http: reqwest::Client,
    url: String,
    credentials: UpstoxCredentials,
}

impl TokenClient {
    /// Create a client for the given token URL with a bounded timeout.
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest` error when the HTTP client cannot
    /// be constructed.
    pub fn new(
        url: String,
        timeout: Duration,
        credentials: UpstoxCredentials,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url,
            credentials,
        })
    }

    /// Exchange an authorization code for a bearer access token.
    ///
    /// # Errors
    ///
    /// - [`TokenExchangeError::Validation`] for an empty code
    /// - [`TokenExchangeError::Configuration`] when a credential setting is
    ///   unset
    /// - [`TokenExchangeError::Transport`] / [`TokenExchangeError::Upstream`]
    ///   for broker failures
    /// - [`TokenExchangeError::ResponseFormat`] when the success body lacks
    ///   an `access_token`
    pub async fn exchange_code(&self, code: &str) -> Result<AccessToken, TokenExchangeError> {
        if code.trim().is_empty() {
            return Err(TokenExchangeError::Validation(
                "authorization code must not be empty",
            ));
        }

        let client_id = self
            .credentials
            .client_id()
            .ok_or(TokenExchangeError::Configuration("UPSTOX_CLIENT_ID"))?;
        let client_secret = self
            .credentials
            .client_secret()
            .ok_or(TokenExchangeError::Configuration("UPSTOX_CLIENT_SECRET"))?;
        let redirect_uri = self
            .credentials
            .redirect_uri()
            .ok_or(TokenExchangeError::Configuration("UPSTOX_REDIRECT_URI"))?;

        let form = [
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(&self.url)
            .form(&form)
            .send()
            .await
            .map_err(|e| TokenExchangeError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TokenExchangeError::Transport(e.to_string()))?;

        if !status.is_success() {
            metrics::record_token_exchange("upstream_error");
            return Err(TokenExchangeError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| TokenExchangeError::ResponseFormat(format!("invalid JSON: {e}")))?;

        match parsed.access_token.and_then(AccessToken::new) {
            Some(token) => {
                metrics::record_token_exchange("success");
                tracing::info!("Authorization code exchanged for access token");
                Ok(token)
            }
            None => {
                metrics::record_token_exchange("malformed_response");
                Err(TokenExchangeError::ResponseFormat(
                    "access_token field missing or empty".to_string(),
                ))
            }
        }
    }
}

impl std::fmt::Debug for TokenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenClient")
            .field("url", &self.url)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with(credentials: UpstoxCredentials) -> TokenClient {
        TokenClient::new(
            "http://127.0.0.1:9/token".to_string(),
            Duration::from_secs(1),
            credentials,
        )
        .unwrap()
    }

    fn full_credentials() -> UpstoxCredentials {
        UpstoxCredentials::new(
            Some("client".to_string()),
            Some("secret".to_string()),
            Some("https://localhost/cb".to_string()),
        )
    }

    #[tokio::test]
    async fn empty_code_fails_validation_before_any_request() {
        // Port 9 (discard) would fail the request; validation must win first.
        let err = client_with(full_credentials())
            .exchange_code("")
            .await
            .unwrap_err();
        assert!(matches!(err, TokenExchangeError::Validation(_)));
    }

    #[tokio::test]
    async fn whitespace_code_fails_validation() {
        let err = client_with(full_credentials())
            .exchange_code("   ")
            .await
            .unwrap_err();
        assert!(matches!(err, TokenExchangeError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_secret_fails_configuration_without_leaking() {
        let credentials = UpstoxCredentials::new(
            Some("client".to_string()),
            None,
            Some("https://localhost/cb".to_string()),
        );

        let err = client_with(credentials)
            .exchange_code("auth-code")
            .await
            .unwrap_err();

        assert!(matches!(err, TokenExchangeError::Configuration(_)));
        assert_eq!(err.to_string(), "missing required setting: UPSTOX_CLIENT_SECRET");
    }

    #[tokio::test]
    async fn missing_client_id_fails_configuration() {
        let credentials = UpstoxCredentials::new(
            None,
            Some("secret".to_string()),
            Some("https://localhost/cb".to_string()),
        );

        let err = client_with(credentials)
            .exchange_code("auth-code")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TokenExchangeError::Configuration("UPSTOX_CLIENT_ID")
        ));
    }

    #[tokio::test]
    async fn missing_redirect_uri_fails_configuration() {
        let credentials =
            UpstoxCredentials::new(Some("client".to_string()), Some("secret".to_string()), None);

        let err = client_with(credentials)
            .exchange_code("auth-code")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TokenExchangeError::Configuration("UPSTOX_REDIRECT_URI")
        ));
    }
}
