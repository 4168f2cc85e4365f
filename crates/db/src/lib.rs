//! PostgreSQL persistence for the custody ledger.
//!
//! Zero-sized repositories in [`repositories`] own the SQL; [`ledger`] adapts
//! them to the `custody-core` traits.

use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod ledger;
pub mod models;
pub mod repositories;

pub use ledger::{PgDirectory, PgMovementLedger};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the pool can reach the database.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
