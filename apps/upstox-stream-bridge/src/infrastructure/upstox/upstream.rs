//! Upstream Feed Socket
//!
//! Opens the dedicated upstream WebSocket a relay session forwards from.
//! The connection is authenticated with the same bearer token that passed
//! feed authorization, and is owned exclusively by one session.

use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::AccessToken;

/// An established upstream feed socket.
pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Failure while opening the upstream socket.
#[derive(Debug, Error)]
pub enum UpstreamConnectError {
    /// The socket URL from feed authorization is not a valid request.
    #[error("invalid upstream socket URL: {0}")]
    BadUrl(String),

    /// The WebSocket handshake failed.
    #[error("upstream handshake failed: {0}")]
    Handshake(String),
}

/// Connector for per-session upstream sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpstreamConnector;

impl UpstreamConnector {
    /// Create a connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Open one upstream socket authenticated with the given bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamConnectError`] when the URL is unusable or the
    /// handshake fails.
    pub async fn connect(
        &self,
        url: &str,
        token: &AccessToken,
    ) -> Result<UpstreamSocket, UpstreamConnectError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| UpstreamConnectError::BadUrl(e.to_string()))?;

        let bearer = HeaderValue::from_str(&token.bearer_header())
            .map_err(|e| UpstreamConnectError::BadUrl(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (socket, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| UpstreamConnectError::Handshake(e.to_string()))?;

        Ok(socket)
    }
}
