//! `PostgreSQL` backend for the sugarcane commerce engine.
//!
//! Implements the engine's [`Store`](sugarcane_engine::store::Store)
//! contract on top of `sqlx` transactions. Stock decrements are conditional
//! updates and cart lookups take a row lock, so the engine's atomicity and
//! no-oversell guarantees hold across connections, not just within one
//! process.
//!
//! Run the bundled migrations before first use:
//!
//! ```rust,ignore
//! sugarcane_postgres::MIGRATOR.run(&pool).await?;
//! ```

pub mod config;
pub mod store;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub use config::{ConfigError, PostgresConfig};
pub use store::PgStore;

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
