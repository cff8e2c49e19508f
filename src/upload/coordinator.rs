//! Upload Coordinator
//!
//! Owns the upload state machine's edges: `Init` validates geometry and
//! opens a share in `uploading`; `Finalize` checks completeness and moves
//! it to `ready`. Per-chunk ingestion itself belongs to the Chunk Engine.

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::clock::SharedClock;
use crate::db;
use crate::error::{Result, ShareError};
use crate::share::{FileSpec, ShareRegistry, ShareStatus};

use super::types::{FinalizeResponse, InitRequest, InitResponse};

pub struct UploadCoordinator {
    registry: ShareRegistry,
    pool: SqlitePool,
    clock: SharedClock,
    max_file_size: i64,
    max_chunk_bytes: i64,
    default_max_downloads: i64,
    default_expires_in_hours: i64,
}

impl UploadCoordinator {
    pub fn new(
        registry: ShareRegistry,
        pool: SqlitePool,
        max_file_size: i64,
        max_chunk_bytes: i64,
        default_max_downloads: i64,
        default_expires_in_hours: i64,
    ) -> Self {
        let clock = registry.clock();
        Self {
            registry,
            pool,
            clock,
            max_file_size,
            max_chunk_bytes,
            default_max_downloads,
            default_expires_in_hours,
        }
    }

    pub async fn init(&self, req: InitRequest, client_ip: &str) -> Result<InitResponse> {
        if req.salt.is_empty() {
            return Err(ShareError::Invalid("salt must not be empty".into()));
        }
        if req.encrypted_filename.is_empty() {
            return Err(ShareError::Invalid("encrypted_filename must not be empty".into()));
        }
        if req.encrypted_mime_type.is_empty() {
            return Err(ShareError::Invalid("encrypted_mime_type must not be empty".into()));
        }
        if req.pbkdf2_iterations <= 0 {
            return Err(ShareError::Invalid("pbkdf2_iterations must be positive".into()));
        }
        if req.total_size <= 0 {
            return Err(ShareError::Invalid("total_size must be positive".into()));
        }
        if req.chunk_size <= 0 {
            return Err(ShareError::Invalid("chunk_size must be positive".into()));
        }
        if req.chunk_count <= 0 {
            return Err(ShareError::Invalid("chunk_count must be positive".into()));
        }
        if req.total_size > self.max_file_size {
            return Err(ShareError::Invalid(format!(
                "total_size {} exceeds max {}",
                req.total_size, self.max_file_size
            )));
        }
        if req.chunk_size > self.max_chunk_bytes {
            return Err(ShareError::Invalid(format!(
                "chunk_size {} exceeds max_chunk_bytes {}",
                req.chunk_size, self.max_chunk_bytes
            )));
        }

        let expected_chunk_count =
            (req.total_size + req.chunk_size - 1) / req.chunk_size;
        if req.chunk_count != expected_chunk_count {
            return Err(ShareError::Invalid(format!(
                "chunk_count {} does not match ceil(total_size/chunk_size) = {}",
                req.chunk_count, expected_chunk_count
            )));
        }
        let last_chunk_size = req.total_size - (req.chunk_count - 1) * req.chunk_size;
        if last_chunk_size <= 0 || last_chunk_size > req.chunk_size {
            return Err(ShareError::Invalid(
                "implied last chunk size is inconsistent with chunk_count/chunk_size".into(),
            ));
        }

        if let Some(max_downloads) = req.max_downloads {
            if max_downloads <= 0 {
                return Err(ShareError::Invalid("max_downloads must be positive".into()));
            }
        }
        if let Some(hours) = req.expires_in_hours {
            if hours <= 0 {
                return Err(ShareError::Invalid("expires_in_hours must be positive".into()));
            }
        }

        let uploader_ip = match IpAddr::from_str(client_ip) {
            Ok(ip) => ip.to_string(),
            Err(_) => {
                tracing::warn!(client_ip, "unparseable client IP, recording 127.0.0.1");
                "127.0.0.1".to_string()
            }
        };

        let max_downloads = req.max_downloads.unwrap_or(self.default_max_downloads);
        let expires_in_hours = req.expires_in_hours.unwrap_or(self.default_expires_in_hours);
        let expires_at = self.clock.now() + chrono::Duration::hours(expires_in_hours);

        let upload_token = Uuid::new_v4().to_string();
        let deletion_token_hash = hash_token(&upload_token);

        let file = self
            .registry
            .create(FileSpec {
                encrypted_filename: req.encrypted_filename,
                encrypted_mime_type: req.encrypted_mime_type,
                salt: req.salt,
                pbkdf2_iterations: req.pbkdf2_iterations,
                total_size: req.total_size,
                chunk_size: req.chunk_size,
                chunk_count: req.chunk_count,
                expires_at,
                max_downloads,
                uploader_ip,
                deletion_token_hash,
            })
            .await?;

        Ok(InitResponse {
            file_id: file.id,
            share_id: file.share_id,
            upload_token,
            expires_at: file.expires_at,
        })
    }

    /// Checks the bearer token presented on a chunk-upload or finalize call
    /// against the hash recorded at `Init`. This is the sole authorization
    /// check on those paths (spec §4.3).
    pub async fn authorize(&self, file_id: &str, presented_token: &str) -> Result<()> {
        if presented_token.is_empty() {
            return Err(ShareError::Unauthorized);
        }
        let file = self.registry.get_by_id(file_id).await?;
        let expected = file.deletion_token_hash.as_deref().unwrap_or("");
        if hash_token(presented_token) != expected {
            return Err(ShareError::Unauthorized);
        }
        Ok(())
    }

    pub async fn finalize(&self, file_id: &str, presented_token: &str) -> Result<FinalizeResponse> {
        self.authorize(file_id, presented_token).await?;

        let file = self.registry.get_by_id(file_id).await?;
        let uploaded = db::chunks::count_for_file(&self.pool, file_id).await?;
        if uploaded != file.chunk_count {
            return Err(ShareError::Incomplete((file.chunk_count - uploaded).max(0) as usize));
        }

        let file = self.registry.set_status(file_id, ShareStatus::Ready).await?;

        Ok(FinalizeResponse {
            share_id: file.share_id,
            deletion_token: presented_token.to_string(),
        })
    }
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use chrono::Utc;

    async fn test_coordinator() -> (UploadCoordinator, Arc<FakeClock>) {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        let clock = Arc::new(FakeClock::new(Utc::now()));
        let registry = ShareRegistry::new(pool.clone(), clock.clone());
        (
            UploadCoordinator::new(registry, pool, 5 * 1024 * 1024 * 1024, 64 * 1024 * 1024, 5, 72),
            clock,
        )
    }

    fn valid_init() -> InitRequest {
        InitRequest {
            encrypted_filename: "ciphertext-name".into(),
            encrypted_mime_type: "ciphertext-mime".into(),
            salt: "c2FsdHNhbHRzYWx0c2FsdA==".into(),
            pbkdf2_iterations: 100_000,
            total_size: 1_048_576,
            chunk_size: 262_144,
            chunk_count: 4,
            max_downloads: Some(5),
            expires_in_hours: Some(24),
        }
    }

    #[tokio::test]
    async fn init_accepts_consistent_geometry() {
        let (coordinator, _clock) = test_coordinator().await;
        let response = coordinator.init(valid_init(), "203.0.113.9").await.unwrap();
        assert_eq!(response.share_id.len(), 12);
        assert!(!response.upload_token.is_empty());
    }

    #[tokio::test]
    async fn init_rejects_chunk_size_over_ceiling() {
        let (coordinator, _clock) = test_coordinator().await;
        let mut req = valid_init();
        req.total_size = 128 * 1024 * 1024;
        req.chunk_size = 65 * 1024 * 1024;
        req.chunk_count = 2;
        let err = coordinator.init(req, "203.0.113.9").await.unwrap_err();
        assert!(matches!(err, ShareError::Invalid(_)));
    }

    #[tokio::test]
    async fn init_rejects_inconsistent_chunk_count() {
        let (coordinator, _clock) = test_coordinator().await;
        let mut req = valid_init();
        req.chunk_count = 3;
        let err = coordinator.init(req, "203.0.113.9").await.unwrap_err();
        assert!(matches!(err, ShareError::Invalid(_)));
    }

    #[tokio::test]
    async fn init_falls_back_to_loopback_on_unparseable_ip() {
        let (coordinator, _clock) = test_coordinator().await;
        let response = coordinator.init(valid_init(), "not-an-ip").await.unwrap();
        assert_eq!(response.share_id.len(), 12);
    }

    #[tokio::test]
    async fn finalize_rejects_wrong_token() {
        let (coordinator, _clock) = test_coordinator().await;
        let init = coordinator.init(valid_init(), "203.0.113.9").await.unwrap();
        let err = coordinator
            .finalize(&init.file_id, "wrong-token")
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::Unauthorized));
    }

    #[tokio::test]
    async fn finalize_rejects_incomplete_upload() {
        let (coordinator, _clock) = test_coordinator().await;
        let init = coordinator.init(valid_init(), "203.0.113.9").await.unwrap();
        let err = coordinator
            .finalize(&init.file_id, &init.upload_token)
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::Incomplete(4)));
    }

    #[tokio::test]
    async fn finalize_transitions_to_ready_once_all_chunks_land() {
        let (coordinator, _clock) = test_coordinator().await;
        let init = coordinator.init(valid_init(), "203.0.113.9").await.unwrap();

        for i in 0..4 {
            db::chunks::insert(&coordinator.pool, &init.file_id, i, "path", 1024, "hash")
                .await
                .unwrap();
        }

        let response = coordinator
            .finalize(&init.file_id, &init.upload_token)
            .await
            .unwrap();
        assert_eq!(response.share_id, init.share_id);
        assert_eq!(response.deletion_token, init.upload_token);

        let file = coordinator.registry.get_by_id(&init.file_id).await.unwrap();
        assert_eq!(file.status, ShareStatus::Ready);
    }
}
