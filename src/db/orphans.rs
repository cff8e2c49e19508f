//! Low-level `orphan_blobs` table access
//!
//! Resolves the spec's orphan-blob Open Question: rather than deferring the
//! `expired` transition until every blob is confirmed deleted, the Sweeper
//! records blobs it failed to delete here and moves on. A separate
//! janitorial pass can retry them independently of file state.

use sqlx::SqlitePool;

use crate::error::Result;

pub async fn record(
    pool: &SqlitePool,
    storage_path: &str,
    file_id: &str,
    last_error: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO orphan_blobs (storage_path, file_id, last_error)
        VALUES (?, ?, ?)
        ON CONFLICT(storage_path) DO UPDATE SET last_error = excluded.last_error
        "#,
    )
    .bind(storage_path)
    .bind(file_id)
    .bind(last_error)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orphan_blobs")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
