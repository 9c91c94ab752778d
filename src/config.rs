//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing or
//! malformed. The database URL is wrapped in secrecy::SecretString to
//! prevent log leaks.

use chrono::Duration;
use secrecy::SecretString;

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    /// Table the engine operates on.
    pub namespace: String,
    /// How long an unrenewed claim stays exclusive.
    pub expiration: Duration,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            namespace: std::env::var("LEASEQ_NAMESPACE")
                .unwrap_or_else(|_| "leaseq_items".to_string()),
            expiration: Duration::seconds(int_var("LEASEQ_EXPIRATION_SECS", 30)?),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn int_var(name: &str, default: i64) -> Result<i64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("{name} must be an integer, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}
