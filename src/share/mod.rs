//! Share Registry
//!
//! Stores per-file metadata and enforces status transitions and
//! download-limit semantics transactionally.

mod registry;
mod types;

pub use registry::{FileSpec, ShareRegistry, SHARE_ID_ALPHABET, SHARE_ID_LEN};
pub use types::{CompleteDownloadOutcome, ExpiredFile, File, FileMetadata, ShareStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::error::ShareError;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    async fn test_registry() -> (ShareRegistry, Arc<FakeClock>) {
        let pool = crate::db::create_pool("sqlite::memory:").await.unwrap();
        let clock = Arc::new(FakeClock::new(Utc::now()));
        (ShareRegistry::new(pool, clock.clone()), clock)
    }

    fn spec(max_downloads: i64) -> FileSpec {
        FileSpec {
            encrypted_filename: "ciphertext-name".into(),
            encrypted_mime_type: "ciphertext-mime".into(),
            salt: "c2FsdHNhbHRzYWx0c2FsdA==".into(),
            pbkdf2_iterations: 100_000,
            total_size: 1024,
            chunk_size: 1024,
            chunk_count: 1,
            expires_at: Utc::now() + Duration::hours(24),
            max_downloads,
            uploader_ip: "127.0.0.1".into(),
            deletion_token_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn create_and_fetch_round_trip() {
        let (registry, _clock) = test_registry().await;
        let file = registry.create(spec(5)).await.unwrap();

        assert_eq!(file.status, ShareStatus::Uploading);
        assert_eq!(file.download_count, 0);

        let fetched = registry.get_by_share_id(&file.share_id).await.unwrap();
        assert_eq!(fetched.id, file.id);

        let by_id = registry.get_by_id(&file.id).await.unwrap();
        assert_eq!(by_id.share_id, file.share_id);
    }

    #[tokio::test]
    async fn share_id_has_expected_shape() {
        let (registry, _clock) = test_registry().await;
        let file = registry.create(spec(5)).await.unwrap();

        assert_eq!(file.share_id.len(), SHARE_ID_LEN);
        assert!(file.share_id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn complete_download_not_ready_before_finalize() {
        let (registry, _clock) = test_registry().await;
        let file = registry.create(spec(5)).await.unwrap();

        let err = registry.complete_download(&file.share_id).await.unwrap_err();
        assert!(matches!(err, ShareError::NotReady));
    }

    #[tokio::test]
    async fn complete_download_enforces_limit_and_exhausts() {
        let (registry, _clock) = test_registry().await;
        let file = registry.create(spec(2)).await.unwrap();
        registry.set_status(&file.id, ShareStatus::Ready).await.unwrap();

        let first = registry.complete_download(&file.share_id).await.unwrap();
        assert!(!first.reached_limit);
        assert_eq!(first.file.download_count, 1);

        let second = registry.complete_download(&file.share_id).await.unwrap();
        assert!(second.reached_limit);
        assert_eq!(second.file.download_count, 2);
        assert_eq!(second.file.status, ShareStatus::Exhausted);

        let third = registry.complete_download(&file.share_id).await.unwrap_err();
        assert!(matches!(third, ShareError::DownloadLimitReached));
    }

    #[tokio::test]
    async fn complete_download_classifies_expired_over_limit_reached() {
        let (registry, clock) = test_registry().await;
        let file = registry.create(spec(5)).await.unwrap();
        registry.set_status(&file.id, ShareStatus::Ready).await.unwrap();

        clock.advance(Duration::hours(25));

        let err = registry.complete_download(&file.share_id).await.unwrap_err();
        assert!(matches!(err, ShareError::Expired));
    }

    #[tokio::test]
    async fn metadata_for_download_rejects_expired_status() {
        let (registry, _clock) = test_registry().await;
        let file = registry.create(spec(5)).await.unwrap();
        registry.set_status(&file.id, ShareStatus::Ready).await.unwrap();
        registry.mark_expired(&[file.id.clone()]).await.unwrap();

        let err = registry
            .get_metadata_for_download(&file.share_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::Expired));
    }

    #[tokio::test]
    async fn metadata_for_download_rejects_past_expires_at_even_unswept() {
        let (registry, clock) = test_registry().await;
        let file = registry.create(spec(5)).await.unwrap();
        registry.set_status(&file.id, ShareStatus::Ready).await.unwrap();

        clock.advance(Duration::hours(25));

        let err = registry
            .get_metadata_for_download(&file.share_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::Expired));
    }

    #[tokio::test]
    async fn list_and_mark_expired() {
        let (registry, clock) = test_registry().await;
        let file = registry.create(spec(5)).await.unwrap();
        registry.set_status(&file.id, ShareStatus::Ready).await.unwrap();

        assert!(registry.list_expired().await.unwrap().is_empty());

        clock.advance(Duration::hours(25));

        let expired = registry.list_expired().await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, file.id);

        let marked = registry.mark_expired(&[file.id.clone()]).await.unwrap();
        assert_eq!(marked, 1);

        let refetched = registry.get_by_id(&file.id).await.unwrap();
        assert_eq!(refetched.status, ShareStatus::Expired);
        assert!(registry.list_expired().await.unwrap().is_empty());
    }
}
