//! PostgreSQL persistence for the songbook revision store.
//!
//! Repositories are zero-sized structs whose async methods take `&PgPool`.
//! Operations that must serialize per song (approval, rejection, songbook
//! entry changes) run in a transaction that locks the parent row with
//! `SELECT ... FOR UPDATE` before reading anything they validate against.

pub mod config;
pub mod error;
pub mod models;
pub mod repositories;

use sqlx::postgres::PgPoolOptions;

pub use config::DbConfig;
pub use error::DbError;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from the loaded configuration.
pub async fn create_pool(config: &DbConfig) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(&config.database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
