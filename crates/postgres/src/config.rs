//! Backend configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `SUGARCANE_DATABASE_URL` - `PostgreSQL` connection string; falls back
//!   to `DATABASE_URL` if unset

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// `PostgreSQL` backend configuration.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL (contains password).
    pub database_url: SecretString,
}

impl PostgresConfig {
    /// Load configuration from environment variables, reading a `.env` file
    /// first if one is present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] if no database URL is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("SUGARCANE_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| ConfigError::MissingEnvVar("SUGARCANE_DATABASE_URL".to_owned()))?;

        Ok(Self {
            database_url: SecretString::from(database_url),
        })
    }
}
