//! Configuration Module
//!
//! Environment-driven configuration for the bridge.

mod settings;

pub use settings::{
    BridgeConfig, ConfigError, EndpointSettings, SchedulerSettings, ServerSettings,
    TimeoutSettings, UpstoxCredentials,
};
