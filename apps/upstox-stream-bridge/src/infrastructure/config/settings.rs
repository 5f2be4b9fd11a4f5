//! Bridge Configuration Settings
//!
//! Configuration types for the stream bridge, loaded from environment
//! variables. Upstox credentials are optional at load time: the credential
//! broker reports a configuration error per exchange attempt instead of
//! refusing to start, so the relay keeps working with a token obtained
//! elsewhere.

use std::time::Duration;

use crate::domain::instrument::ContractTarget;

/// Upstox application credentials for the authorization-code exchange.
#[derive(Clone, Default)]
pub struct UpstoxCredentials {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
}

impl UpstoxCredentials {
    /// Create credentials from optional parts; empty strings count as unset.
    #[must_use]
    pub fn new(
        client_id: Option<String>,
        client_secret: Option<String>,
        redirect_uri: Option<String>,
    ) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        Self {
            client_id: non_empty(client_id),
            client_secret: non_empty(client_secret),
            redirect_uri: non_empty(redirect_uri),
        }
    }

    /// Get the configured client id.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Get the configured client secret.
    #[must_use]
    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }

    /// Get the configured redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref()
    }
}

impl std::fmt::Debug for UpstoxCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstoxCredentials")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Upstream Upstox endpoints.
#[derive(Debug, Clone)]
pub struct EndpointSettings {
    /// Gzip-compressed JSON instrument catalog.
    pub catalog_url: String,
    /// OAuth authorization-code token exchange.
    pub token_url: String,
    /// Feed-authorization handshake returning the one-time socket URL.
    pub feed_auth_url: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            catalog_url: "https://assets.upstox.com/market-quote/instruments/exchange/NSE.json.gz"
                .to_string(),
            token_url: "https://api.upstox.com/v2/login/authorization/token".to_string(),
            feed_auth_url: "https://api.upstox.com/v3/feed/market-data-feed/authorize".to_string(),
        }
    }
}

/// Upper bounds on upstream HTTP calls.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutSettings {
    /// Catalog fetch bound.
    pub catalog: Duration,
    /// Token exchange bound.
    pub token: Duration,
    /// Feed-authorization bound.
    pub feed_auth: Duration,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            catalog: Duration::from_secs(30),
            token: Duration::from_secs(15),
            feed_auth: Duration::from_secs(10),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, Copy)]
pub struct ServerSettings {
    /// API + WebSocket relay port.
    pub api_port: u16,
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            api_port: 8000,
            health_port: 8082,
        }
    }
}

/// Signal scheduler settings.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// Pause between ticks, measured from the end of the previous tick.
    pub tick_interval: Duration,
    /// Capacity of the signal broadcast channel.
    pub channel_capacity: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            channel_capacity: 64,
        }
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Upstox application credentials.
    pub credentials: UpstoxCredentials,
    /// Upstream endpoints.
    pub endpoints: EndpointSettings,
    /// Upstream call bounds.
    pub timeouts: TimeoutSettings,
    /// Server ports.
    pub server: ServerSettings,
    /// Signal scheduler cadence.
    pub scheduler: SchedulerSettings,
    /// The contract the bridge resolves and streams.
    pub target: ContractTarget,
}

impl BridgeConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when a set variable holds an invalid value
    /// (currently only `BRIDGE_TARGET_EXPIRY_MONTH`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let credentials = UpstoxCredentials::new(
            std::env::var("UPSTOX_CLIENT_ID").ok(),
            std::env::var("UPSTOX_CLIENT_SECRET").ok(),
            std::env::var("UPSTOX_REDIRECT_URI").ok(),
        );

        let defaults = EndpointSettings::default();
        let endpoints = EndpointSettings {
            catalog_url: parse_env_string("BRIDGE_CATALOG_URL", defaults.catalog_url),
            token_url: parse_env_string("BRIDGE_TOKEN_URL", defaults.token_url),
            feed_auth_url: parse_env_string("BRIDGE_FEED_AUTH_URL", defaults.feed_auth_url),
        };

        let timeouts = TimeoutSettings {
            catalog: parse_env_duration_secs(
                "BRIDGE_CATALOG_TIMEOUT_SECS",
                TimeoutSettings::default().catalog,
            ),
            token: parse_env_duration_secs(
                "BRIDGE_TOKEN_TIMEOUT_SECS",
                TimeoutSettings::default().token,
            ),
            feed_auth: parse_env_duration_secs(
                "BRIDGE_FEED_AUTH_TIMEOUT_SECS",
                TimeoutSettings::default().feed_auth,
            ),
        };

        let server = ServerSettings {
            api_port: parse_env_u16("BRIDGE_API_PORT", ServerSettings::default().api_port),
            health_port: parse_env_u16("BRIDGE_HEALTH_PORT", ServerSettings::default().health_port),
        };

        let scheduler = SchedulerSettings {
            tick_interval: parse_env_duration_secs(
                "BRIDGE_SIGNAL_INTERVAL_SECS",
                SchedulerSettings::default().tick_interval,
            ),
            channel_capacity: SchedulerSettings::default().channel_capacity,
        };

        let underlying = parse_env_string("BRIDGE_TARGET_UNDERLYING", "BANKNIFTY".to_string());
        let expiry_month = match std::env::var("BRIDGE_TARGET_EXPIRY_MONTH") {
            Ok(value) => {
                validate_expiry_month(&value).map_err(|reason| ConfigError::InvalidValue {
                    key: "BRIDGE_TARGET_EXPIRY_MONTH".to_string(),
                    reason,
                })?;
                value
            }
            // Daily operation targets the current month unless pinned.
            Err(_) => chrono::Local::now().format("%Y-%m").to_string(),
        };

        Ok(Self {
            credentials,
            endpoints,
            timeouts,
            server,
            scheduler,
            target: ContractTarget::new(underlying, expiry_month),
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable holds a value the bridge cannot use.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Validate a `YYYY-MM` expiry month string.
fn validate_expiry_month(value: &str) -> Result<(), String> {
    let Some((year, month)) = value.split_once('-') else {
        return Err(format!("expected YYYY-MM, got {value:?}"));
    };

    if year.len() != 4 || year.bytes().any(|b| !b.is_ascii_digit()) {
        return Err(format!("expected four-digit year, got {year:?}"));
    }

    match month.parse::<u8>() {
        Ok(m) if month.len() == 2 && (1..=12).contains(&m) => Ok(()),
        _ => Err(format!("expected two-digit month 01-12, got {month:?}")),
    }
}

fn parse_env_string(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}
