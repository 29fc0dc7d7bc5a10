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
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid bind address {0}")]
    InvalidBindAddress(String),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Invalid currency code '{0}', expected three letters")]
    InvalidCurrency(String),

    #[error("Invalid IP address '{value}' in {field}")]
    InvalidIpAddress { field: &'static str, value: String },

    #[error("Invalid URL '{value}' in {field}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{0} must use HTTPS in production")]
    MustBeHttps(&'static str),

    #[error("Signable parameter set {0} is empty")]
    EmptySignableSet(&'static str),

    #[error("SHA-OUT parameter set must sign {0}")]
    UnsignedConfirmationField(&'static str),

    #[error("Origin checking is enabled but no allowed confirmers are configured")]
    NoAllowedConfirmers,
}
