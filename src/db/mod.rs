//! Database module for SQLite persistence
//!
//! Holds the `files` and `chunks` tables that back the Share Registry and
//! Chunk Engine.

pub mod chunks;
pub mod files;
pub mod orphans;
mod schema;

pub use schema::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::error::Result;

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    // An in-memory database is private to the connection that opened it, so
    // a pool of more than one connection would see an empty schema on every
    // connection but the first. Tests and benches that pass `:memory:` get a
    // single-connection pool instead; real deployments (file-backed, WAL)
    // keep the full pool.
    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    // Run migrations
    initialize_schema(&pool).await?;

    Ok(pool)
}
