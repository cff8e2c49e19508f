//! Low-level `chunks` table access

use sqlx::SqlitePool;

use crate::error::Result;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChunkRow {
    pub file_id: String,
    pub chunk_index: i64,
    pub storage_path: String,
    pub encrypted_size: i64,
    pub chunk_hash: String,
    pub uploaded_at: String,
}

/// Insert a chunk record. A unique-constraint violation on
/// `(file_id, chunk_index)` is surfaced as a plain `sqlx::Error` so the
/// Chunk Engine can translate the race into `AlreadyUploaded`.
pub async fn insert(
    pool: &SqlitePool,
    file_id: &str,
    chunk_index: i64,
    storage_path: &str,
    encrypted_size: i64,
    chunk_hash: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO chunks (file_id, chunk_index, storage_path, encrypted_size, chunk_hash)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(file_id)
    .bind(chunk_index)
    .bind(storage_path)
    .bind(encrypted_size)
    .bind(chunk_hash)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, file_id: &str, chunk_index: i64) -> Result<Option<ChunkRow>> {
    let row = sqlx::query_as::<_, ChunkRow>(
        "SELECT * FROM chunks WHERE file_id = ? AND chunk_index = ?",
    )
    .bind(file_id)
    .bind(chunk_index)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn count_for_file(pool: &SqlitePool, file_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE file_id = ?")
        .bind(file_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
