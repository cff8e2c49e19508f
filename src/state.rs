//! Application state management

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::admission::AdmissionGate;
use crate::chunk::ChunkEngine;
use crate::clock::SystemClock;
use crate::config::Config;
use crate::share::ShareRegistry;
use crate::storage::S3Client;
use crate::upload::UploadCoordinator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    s3_client: S3Client,
    db: SqlitePool,
    registry: ShareRegistry,
    chunk_engine: ChunkEngine,
    coordinator: UploadCoordinator,
    admission: AdmissionGate,
}

impl AppState {
    pub fn new(config: Config, s3_client: S3Client, db: SqlitePool) -> Self {
        let clock = Arc::new(SystemClock);
        let registry = ShareRegistry::new(db.clone(), clock.clone());
        let chunk_engine =
            ChunkEngine::new(db.clone(), s3_client.clone(), config.server.max_chunk_bytes);
        let coordinator = UploadCoordinator::new(
            registry.clone(),
            db.clone(),
            config.limits.max_file_size as i64,
            config.server.max_chunk_bytes as i64,
            config.limits.default_max_downloads,
            config.limits.default_expires_in_hours,
        );
        let admission = AdmissionGate::new(config.rate_limits.clone(), clock);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                s3_client,
                db,
                registry,
                chunk_engine,
                coordinator,
                admission,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn s3_client(&self) -> &S3Client {
        &self.inner.s3_client
    }

    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    pub fn registry(&self) -> &ShareRegistry {
        &self.inner.registry
    }

    pub fn chunk_engine(&self) -> &ChunkEngine {
        &self.inner.chunk_engine
    }

    pub fn coordinator(&self) -> &UploadCoordinator {
        &self.inner.coordinator
    }

    pub fn admission(&self) -> &AdmissionGate {
        &self.inner.admission
    }
}
