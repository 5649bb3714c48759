//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `EVENT_BUS` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use event_bus::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Publishing on {}:<type>", config.bus.channel_prefix);
//! ```

mod bus;
mod error;
mod redis;
mod telemetry;

pub use bus::BusConfig;
pub use error::{ConfigError, ValidationError};
pub use redis::RedisConfig;
pub use telemetry::{Environment, TelemetryConfig};

use serde::Deserialize;

/// Root configuration of the event bus daemon
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Redis configuration (store, retry ledger, pub/sub)
    pub redis: RedisConfig,

    /// Bus configuration (channels, TTLs, handler deadline)
    #[serde(default)]
    pub bus: BusConfig,

    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `EVENT_BUS` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `EVENT_BUS__REDIS__URL=redis://...` -> `redis.url = ...`
    /// - `EVENT_BUS__BUS__HANDLER_TIMEOUT_MS=5000` -> `bus.handler_timeout_ms = 5000`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("EVENT_BUS")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.redis.validate()?;
        self.bus.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.telemetry.is_production()
    }
}
