//! Share Registry domain types

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::files::FileRow;
use crate::error::ShareError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareStatus {
    Uploading,
    Ready,
    Exhausted,
    Expired,
}

impl ShareStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ShareStatus::Uploading => "uploading",
            ShareStatus::Ready => "ready",
            ShareStatus::Exhausted => "exhausted",
            ShareStatus::Expired => "expired",
        }
    }
}

impl std::str::FromStr for ShareStatus {
    type Err = ShareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploading" => Ok(ShareStatus::Uploading),
            "ready" => Ok(ShareStatus::Ready),
            "exhausted" => Ok(ShareStatus::Exhausted),
            "expired" => Ok(ShareStatus::Expired),
            other => Err(ShareError::Internal(format!("unknown status {other}"))),
        }
    }
}

/// A File record, parsed out of its SQL row representation.
#[derive(Debug, Clone)]
pub struct File {
    pub id: String,
    pub share_id: String,
    pub encrypted_filename: String,
    pub encrypted_mime_type: String,
    pub salt: String,
    pub pbkdf2_iterations: i64,
    pub total_size: i64,
    pub chunk_size: i64,
    pub chunk_count: i64,
    pub status: ShareStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_downloaded_at: Option<DateTime<Utc>>,
    pub max_downloads: i64,
    pub download_count: i64,
    pub uploader_ip: String,
    pub deletion_token_hash: Option<String>,
}

impl TryFrom<FileRow> for File {
    type Error = ShareError;

    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        let parse_ts = |s: &str| -> Result<DateTime<Utc>, ShareError> {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| ShareError::Internal(format!("bad timestamp {s}: {e}")))
        };

        Ok(File {
            id: row.id,
            share_id: row.share_id,
            encrypted_filename: row.encrypted_filename,
            encrypted_mime_type: row.encrypted_mime_type,
            salt: row.salt,
            pbkdf2_iterations: row.pbkdf2_iterations,
            total_size: row.total_size,
            chunk_size: row.chunk_size,
            chunk_count: row.chunk_count,
            status: row.status.parse()?,
            created_at: parse_ts(&row.created_at)?,
            expires_at: parse_ts(&row.expires_at)?,
            last_downloaded_at: row.last_downloaded_at.as_deref().map(parse_ts).transpose()?,
            max_downloads: row.max_downloads,
            download_count: row.download_count,
            uploader_ip: row.uploader_ip,
            deletion_token_hash: row.deletion_token_hash,
        })
    }
}

/// The subset of a File record safe to expose to any holder of the share id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub encrypted_filename: String,
    pub encrypted_mime_type: String,
    pub salt: String,
    pub total_size: i64,
    pub chunk_count: i64,
    pub expires_at: DateTime<Utc>,
    pub max_downloads: i64,
    pub download_count: i64,
}

impl From<&File> for FileMetadata {
    fn from(file: &File) -> Self {
        Self {
            encrypted_filename: file.encrypted_filename.clone(),
            encrypted_mime_type: file.encrypted_mime_type.clone(),
            salt: file.salt.clone(),
            total_size: file.total_size,
            chunk_count: file.chunk_count,
            expires_at: file.expires_at,
            max_downloads: file.max_downloads,
            download_count: file.download_count,
        }
    }
}

/// Outcome of a successful `CompleteDownload` call.
#[derive(Debug, Clone)]
pub struct CompleteDownloadOutcome {
    pub file: File,
    pub reached_limit: bool,
}

/// A file pending expiry, as handed to the Sweeper.
#[derive(Debug, Clone)]
pub struct ExpiredFile {
    pub id: String,
    pub chunk_count: i64,
}
