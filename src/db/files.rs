//! Low-level `files` table access
//!
//! This module only talks SQL. The Share Registry (`crate::share`) wraps
//! these functions with the domain-level error classification the spec
//! requires.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::Result;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FileRow {
    pub id: String,
    pub share_id: String,
    pub encrypted_filename: String,
    pub encrypted_mime_type: String,
    pub salt: String,
    pub pbkdf2_iterations: i64,
    pub total_size: i64,
    pub chunk_size: i64,
    pub chunk_count: i64,
    pub status: String,
    pub created_at: String,
    pub expires_at: String,
    pub last_downloaded_at: Option<String>,
    pub max_downloads: i64,
    pub download_count: i64,
    pub uploader_ip: String,
    pub deletion_token_hash: Option<String>,
}

pub struct NewFile {
    pub id: String,
    pub share_id: String,
    pub encrypted_filename: String,
    pub encrypted_mime_type: String,
    pub salt: String,
    pub pbkdf2_iterations: i64,
    pub total_size: i64,
    pub chunk_size: i64,
    pub chunk_count: i64,
    pub expires_at: DateTime<Utc>,
    pub max_downloads: i64,
    pub uploader_ip: String,
    pub deletion_token_hash: String,
}

/// Insert a new file row in status `uploading`. Bubbles up the unique
/// constraint violation on `share_id` unchanged so the caller can retry
/// with a fresh id (invariant 1 in the spec).
pub async fn insert(pool: &SqlitePool, file: &NewFile) -> sqlx::Result<FileRow> {
    sqlx::query_as::<_, FileRow>(
        r#"
        INSERT INTO files (
            id, share_id, encrypted_filename, encrypted_mime_type, salt,
            pbkdf2_iterations, total_size, chunk_size, chunk_count,
            status, expires_at, max_downloads, uploader_ip, deletion_token_hash
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'uploading', ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&file.id)
    .bind(&file.share_id)
    .bind(&file.encrypted_filename)
    .bind(&file.encrypted_mime_type)
    .bind(&file.salt)
    .bind(file.pbkdf2_iterations)
    .bind(file.total_size)
    .bind(file.chunk_size)
    .bind(file.chunk_count)
    .bind(file.expires_at.to_rfc3339())
    .bind(file.max_downloads)
    .bind(&file.uploader_ip)
    .bind(&file.deletion_token_hash)
    .fetch_one(pool)
    .await
}

pub async fn get_by_share_id(pool: &SqlitePool, share_id: &str) -> Result<Option<FileRow>> {
    let row = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE share_id = ?")
        .bind(share_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn get_by_id(pool: &SqlitePool, id: &str) -> Result<Option<FileRow>> {
    let row = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Unconditional status transition. Callers are responsible for respecting
/// the DAG described in the spec.
pub async fn set_status(pool: &SqlitePool, id: &str, status: &str) -> Result<Option<FileRow>> {
    let row = sqlx::query_as::<_, FileRow>(
        "UPDATE files SET status = ? WHERE id = ? RETURNING *",
    )
    .bind(status)
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// The one non-trivial concurrency primitive in the whole system: a single
/// conditional `UPDATE ... RETURNING` that only one of N concurrent callers
/// can win for each unit of remaining download quota. No read-then-write.
pub async fn try_complete_download(
    pool: &SqlitePool,
    share_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<FileRow>> {
    let row = sqlx::query_as::<_, FileRow>(
        r#"
        UPDATE files
        SET download_count = download_count + 1,
            last_downloaded_at = ?,
            status = CASE WHEN download_count + 1 >= max_downloads THEN 'exhausted' ELSE status END
        WHERE share_id = ?
          AND status = 'ready'
          AND expires_at > ?
          AND download_count < max_downloads
        RETURNING *
        "#,
    )
    .bind(now.to_rfc3339())
    .bind(share_id)
    .bind(now.to_rfc3339())
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Files that are either past their expiry or have exhausted their
/// download quota, and are not already `expired`.
pub async fn list_expired(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<FileRow>> {
    let rows = sqlx::query_as::<_, FileRow>(
        r#"
        SELECT * FROM files
        WHERE status != 'expired'
          AND (expires_at <= ? OR download_count >= max_downloads)
        "#,
    )
    .bind(now.to_rfc3339())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn mark_expired(pool: &SqlitePool, ids: &[String]) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    let sql = format!("UPDATE files SET status = 'expired' WHERE id IN ({placeholders})");
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id);
    }
    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}
