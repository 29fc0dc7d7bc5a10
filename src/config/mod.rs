//! Application configuration module
//!
//! Configuration is loaded from environment variables with the
//! `VIVEUM_OFFSITE` prefix. Nested values use double underscores.
//!
//! # Example
//!
//! ```no_run
//! use viveum_offsite::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod payment;
mod server;
mod shop;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use server::{Environment, ServerConfig};
pub use shop::ShopConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL; orders are kept in memory when absent
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// PSP account, passphrases and trust lists
    pub payment: PaymentConfig,

    /// Customer landing pages
    #[serde(default)]
    pub shop: ShopConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Loads `.env` if present, then reads `VIVEUM_OFFSITE__*` variables:
    ///
    /// - `VIVEUM_OFFSITE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `VIVEUM_OFFSITE__PAYMENT__PSPID=...` -> `payment.pspid = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("VIVEUM_OFFSITE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        self.payment.validate(&self.server.environment)?;
        self.shop.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;

    // env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "VIVEUM_OFFSITE__PAYMENT__PSPID",
        "VIVEUM_OFFSITE__PAYMENT__SHA_IN_PASSPHRASE",
        "VIVEUM_OFFSITE__PAYMENT__SHA_OUT_PASSPHRASE",
        "VIVEUM_OFFSITE__PAYMENT__SITE_BASE_URL",
        "VIVEUM_OFFSITE__PAYMENT__ALLOWED_CONFIRMERS",
        "VIVEUM_OFFSITE__PAYMENT__HASH_ALGORITHM",
        "VIVEUM_OFFSITE__PAYMENT__USE_SESSION_ID",
        "VIVEUM_OFFSITE__DATABASE__URL",
        "VIVEUM_OFFSITE__SERVER__PORT",
        "VIVEUM_OFFSITE__SERVER__ENVIRONMENT",
    ];

    fn set_minimal_env() {
        env::set_var("VIVEUM_OFFSITE__PAYMENT__PSPID", "viveum-test");
        env::set_var("VIVEUM_OFFSITE__PAYMENT__SHA_IN_PASSPHRASE", "in-secret");
        env::set_var("VIVEUM_OFFSITE__PAYMENT__SHA_OUT_PASSPHRASE", "out-secret");
        env::set_var("VIVEUM_OFFSITE__PAYMENT__SITE_BASE_URL", "https://shop.example");
        env::set_var("VIVEUM_OFFSITE__PAYMENT__ALLOWED_CONFIRMERS", "212.23.45.96");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.payment.pspid, "viveum-test");
        assert_eq!(config.payment.sha_out_passphrase.expose_secret(), "out-secret");
        assert_eq!(config.payment.currency, "EUR");
        assert!(config.payment.check_originating_ip);
        assert!(config.database.is_none());
    }

    #[test]
    fn test_validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().validate().is_ok());
    }

    #[test]
    fn test_optional_sections() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("VIVEUM_OFFSITE__DATABASE__URL", "postgresql://shop@localhost/shop");
        env::set_var("VIVEUM_OFFSITE__PAYMENT__HASH_ALGORITHM", "sha512");
        env::set_var("VIVEUM_OFFSITE__PAYMENT__USE_SESSION_ID", "true");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(
            config.database.map(|d| d.url),
            Some("postgresql://shop@localhost/shop".to_string())
        );
        assert_eq!(
            config.payment.hash_algorithm,
            crate::domain::payment::ShaAlgorithm::Sha512
        );
        assert!(config.payment.use_session_id);
    }

    #[test]
    fn test_missing_passphrase_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::remove_var("VIVEUM_OFFSITE__PAYMENT__SHA_OUT_PASSPHRASE");
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    fn test_is_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("VIVEUM_OFFSITE__SERVER__ENVIRONMENT", "production");
        env::set_var("VIVEUM_OFFSITE__SERVER__PORT", "3000");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
        assert_eq!(config.server.port, 3000);
    }
}
