//! Chunk Engine
//!
//! Validates, persists and retrieves ciphertext chunks. The server never
//! interprets chunk bytes; it only hashes, stores, and streams them back.

use aws_sdk_s3::primitives::ByteStream;
use sqlx::SqlitePool;

use crate::db;
use crate::error::{Result, ShareError};
use crate::storage::S3Client;

use super::types::ChunkReceipt;

#[derive(Clone)]
pub struct ChunkEngine {
    pool: SqlitePool,
    s3: S3Client,
    max_chunk_bytes: u64,
}

impl ChunkEngine {
    pub fn new(pool: SqlitePool, s3: S3Client, max_chunk_bytes: u64) -> Self {
        Self {
            pool,
            s3,
            max_chunk_bytes,
        }
    }

    /// Storage path convention, bit-exact: `{file-uuid-canonical}/{chunk-index-decimal}.enc`.
    pub fn storage_path(file_id: &str, chunk_index: i64) -> String {
        format!("{file_id}/{chunk_index}.enc")
    }

    pub async fn process_upload(
        &self,
        file_id: &str,
        chunk_index: i64,
        ciphertext: Vec<u8>,
        expected_hash: &str,
        filename_hint: Option<&str>,
    ) -> Result<ChunkReceipt> {
        if ciphertext.len() as u64 > self.max_chunk_bytes {
            return Err(ShareError::Invalid(format!(
                "chunk exceeds max_chunk_bytes ({} > {})",
                ciphertext.len(),
                self.max_chunk_bytes
            )));
        }

        if db::chunks::get(&self.pool, file_id, chunk_index).await?.is_some() {
            return Err(ShareError::AlreadyUploaded);
        }

        let file = db::files::get_by_id(&self.pool, file_id)
            .await?
            .ok_or(ShareError::NotUploading)?;
        if file.status != "uploading" {
            return Err(ShareError::NotUploading);
        }

        let actual_hash = hex::encode(<sha2::Sha256 as sha2::Digest>::digest(&ciphertext));
        if !actual_hash.eq_ignore_ascii_case(expected_hash) {
            return Err(ShareError::HashMismatch);
        }

        let storage_path = Self::storage_path(file_id, chunk_index);
        let encrypted_size = ciphertext.len() as i64;

        self.s3
            .put_object(
                &storage_path,
                ciphertext,
                "application/octet-stream",
                filename_hint.map(|hint| ("original-filename", hint)),
            )
            .await?;

        match db::chunks::insert(
            &self.pool,
            file_id,
            chunk_index,
            &storage_path,
            encrypted_size,
            &actual_hash,
        )
        .await
        {
            Ok(()) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                // A concurrent duplicate upload of the same index won the
                // race; the blob we just wrote is redundant with the
                // winner's (same path) and is reclaimed at expiry.
                return Err(ShareError::AlreadyUploaded);
            }
            Err(e) => return Err(ShareError::Internal(e.to_string())),
        }

        Ok(ChunkReceipt {
            chunk_index,
            status: "uploaded",
            hash: actual_hash,
        })
    }

    pub async fn download_chunk(&self, share_id: &str, chunk_index: i64) -> Result<ByteStream> {
        let file = db::files::get_by_share_id(&self.pool, share_id)
            .await?
            .ok_or(ShareError::NotFound)?;

        if file.status != "ready" {
            return Err(ShareError::NotReady);
        }

        let chunk = db::chunks::get(&self.pool, &file.id, chunk_index)
            .await?
            .ok_or(ShareError::NotFound)?;

        if file.download_count >= file.max_downloads {
            return Err(ShareError::DownloadLimitReached);
        }

        self.s3.get_object_stream(&chunk.storage_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    use crate::config::StorageConfig;

    #[test]
    fn storage_path_matches_spec_convention() {
        let path = ChunkEngine::storage_path("abc-123", 7);
        assert_eq!(path, "abc-123/7.enc");
    }

    #[test]
    fn hash_is_hex_sha256() {
        let digest = hex::encode(Sha256::digest(b"hello"));
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    async fn test_engine() -> ChunkEngine {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        let storage_config = StorageConfig {
            endpoint: "http://127.0.0.1:9123".into(),
            bucket: "cryptshare-test".into(),
            access_key: "test".into(),
            secret_key: "test".into(),
            region: "us-east-1".into(),
            force_path_style: true,
        };
        let s3 = S3Client::new(&storage_config).await.unwrap();
        ChunkEngine::new(pool, s3, 64 * 1024 * 1024)
    }

    /// `download_chunk` must refuse a file still in `uploading` before ever
    /// touching the object store — a share id alone must not let a holder
    /// stream chunks of an in-progress upload.
    #[tokio::test]
    async fn download_chunk_rejects_file_not_ready() {
        let engine = test_engine().await;

        let new_file = db::files::NewFile {
            id: "file-1".into(),
            share_id: "share-1".into(),
            encrypted_filename: "ciphertext-name".into(),
            encrypted_mime_type: "ciphertext-mime".into(),
            salt: "c2FsdHNhbHRzYWx0c2FsdA==".into(),
            pbkdf2_iterations: 100_000,
            total_size: 1024,
            chunk_size: 1024,
            chunk_count: 1,
            expires_at: chrono::Utc::now() + chrono::Duration::hours(24),
            max_downloads: 5,
            uploader_ip: "127.0.0.1".into(),
            deletion_token_hash: "hash".into(),
        };
        db::files::insert(&engine.pool, &new_file).await.unwrap();

        let err = engine.download_chunk("share-1", 0).await.unwrap_err();
        assert!(matches!(err, ShareError::NotReady));
    }
}
