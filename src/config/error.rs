//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("{0} timeout must be greater than zero")]
    InvalidTimeout(&'static str),

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Channel prefix must be non-empty and must not contain ':' or '*'")]
    InvalidChannelPrefix,

    #[error("Default event version must not be empty")]
    EmptyDefaultVersion,

    #[error("{0} TTL must be greater than zero")]
    ZeroTtl(&'static str),

    #[error("Handler timeout exceeds maximum allowed (600000ms)")]
    HandlerTimeoutTooLarge,
}
