//! Share Registry
//!
//! Owns every operation that must be atomic with respect to the relational
//! store: creating a share, looking it up, and the transactional
//! download-accounting that enforces `max_downloads` under concurrency.

use std::sync::Arc;

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::clock::SharedClock;
use crate::db;
use crate::error::{Result, ShareError};

use super::types::{CompleteDownloadOutcome, ExpiredFile, File, FileMetadata, ShareStatus};

pub const SHARE_ID_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
pub const SHARE_ID_LEN: usize = 12;

pub struct FileSpec {
    pub encrypted_filename: String,
    pub encrypted_mime_type: String,
    pub salt: String,
    pub pbkdf2_iterations: i64,
    pub total_size: i64,
    pub chunk_size: i64,
    pub chunk_count: i64,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub max_downloads: i64,
    pub uploader_ip: String,
    pub deletion_token_hash: String,
}

#[derive(Clone)]
pub struct ShareRegistry {
    pool: SqlitePool,
    clock: SharedClock,
}

impl ShareRegistry {
    pub fn new(pool: SqlitePool, clock: SharedClock) -> Self {
        Self { pool, clock }
    }

    /// Insert a new file in status `uploading`. Retries with a fresh
    /// `share_id` on collision (invariant 1 in the spec): a 12-character
    /// alphanumeric id drawn uniformly at random has a large enough
    /// keyspace that a second collision in the same request is effectively
    /// impossible, so one retry is enough.
    pub async fn create(&self, mut spec: FileSpec) -> Result<File> {
        const MAX_ATTEMPTS: usize = 3;
        let mut last_err = None;

        for _ in 0..MAX_ATTEMPTS {
            let id = Uuid::new_v4().to_string();
            let share_id = generate_share_id();

            let new_file = db::files::NewFile {
                id,
                share_id,
                encrypted_filename: spec.encrypted_filename.clone(),
                encrypted_mime_type: spec.encrypted_mime_type.clone(),
                salt: spec.salt.clone(),
                pbkdf2_iterations: spec.pbkdf2_iterations,
                total_size: spec.total_size,
                chunk_size: spec.chunk_size,
                chunk_count: spec.chunk_count,
                expires_at: spec.expires_at,
                max_downloads: spec.max_downloads,
                uploader_ip: spec.uploader_ip.clone(),
                deletion_token_hash: spec.deletion_token_hash.clone(),
            };

            match db::files::insert(&self.pool, &new_file).await {
                Ok(row) => return File::try_from(row),
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    last_err = Some(ShareError::Invalid("share_id collision".into()));
                    continue;
                }
                Err(sqlx::Error::Database(e)) => {
                    return Err(ShareError::Invalid(e.to_string()));
                }
                Err(e) => return Err(ShareError::Internal(e.to_string())),
            }
        }

        Err(last_err.unwrap_or_else(|| ShareError::Internal("create retries exhausted".into())))
    }

    pub async fn get_by_share_id(&self, share_id: &str) -> Result<File> {
        let row = db::files::get_by_share_id(&self.pool, share_id)
            .await?
            .ok_or(ShareError::NotFound)?;
        File::try_from(row)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<File> {
        let row = db::files::get_by_id(&self.pool, id).await?.ok_or(ShareError::NotFound)?;
        File::try_from(row)
    }

    pub async fn get_metadata_for_download(&self, share_id: &str) -> Result<FileMetadata> {
        let file = self.get_by_share_id(share_id).await?;
        if file.status == ShareStatus::Expired || file.expires_at <= self.clock.now() {
            return Err(ShareError::Expired);
        }
        Ok(FileMetadata::from(&file))
    }

    pub async fn set_status(&self, id: &str, new_status: ShareStatus) -> Result<File> {
        let row = db::files::set_status(&self.pool, id, new_status.as_str())
            .await?
            .ok_or(ShareError::NotFound)?;
        File::try_from(row)
    }

    /// The central atomic operation. A single conditional `UPDATE ...
    /// RETURNING` either wins or it doesn't; on a miss we perform a
    /// read-only follow-up to classify *why*, privileging `Expired` over
    /// `DownloadLimitReached` because expiry is terminal (spec §9).
    pub async fn complete_download(&self, share_id: &str) -> Result<CompleteDownloadOutcome> {
        let now = self.clock.now();

        if let Some(row) = db::files::try_complete_download(&self.pool, share_id, now).await? {
            let file = File::try_from(row)?;
            let reached_limit = file.download_count >= file.max_downloads;
            return Ok(CompleteDownloadOutcome { file, reached_limit });
        }

        // Advisory classification only — the transactional decision above
        // is authoritative.
        let file = self.get_by_share_id(share_id).await?;

        if file.expires_at <= now {
            return Err(ShareError::Expired);
        }
        if file.download_count >= file.max_downloads {
            return Err(ShareError::DownloadLimitReached);
        }
        if file.status != ShareStatus::Ready {
            return Err(ShareError::NotReady);
        }
        // The row existed and none of the advisory checks explain the
        // miss — another concurrent caller must have won the race between
        // our classification reads.
        Err(ShareError::DownloadLimitReached)
    }

    pub async fn list_expired(&self) -> Result<Vec<ExpiredFile>> {
        let now = self.clock.now();
        let rows = db::files::list_expired(&self.pool, now).await?;
        Ok(rows
            .into_iter()
            .map(|r| ExpiredFile {
                id: r.id,
                chunk_count: r.chunk_count,
            })
            .collect())
    }

    pub async fn mark_expired(&self, ids: &[String]) -> Result<u64> {
        db::files::mark_expired(&self.pool, ids).await
    }

    pub fn clock(&self) -> SharedClock {
        Arc::clone(&self.clock)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn generate_share_id() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..SHARE_ID_LEN)
        .map(|_| SHARE_ID_ALPHABET[rng.gen_range(0..SHARE_ID_ALPHABET.len())] as char)
        .collect()
}
