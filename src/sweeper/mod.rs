//! Expiry Sweeper
//!
//! A single background task that periodically finds exhausted/expired
//! files, deletes their blobs, and terminates their state. Runs
//! cooperatively alongside process shutdown: in-flight work on the current
//! tick completes, but no new tick begins.

use std::time::Duration;

use tokio::sync::watch;

use crate::db;
use crate::share::ShareRegistry;
use crate::storage::S3Client;

pub struct Sweeper {
    registry: ShareRegistry,
    s3: S3Client,
    interval: Duration,
}

impl Sweeper {
    pub fn new(registry: ShareRegistry, s3: S3Client, interval: Duration) -> Self {
        Self {
            registry,
            s3,
            interval,
        }
    }

    /// Runs until `shutdown` fires. Spawn this as its own task.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("expiry sweeper shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One sweep pass. Public so it can be driven directly in tests without
    /// waiting on the real interval.
    pub async fn tick(&self) {
        let expired = match self.registry.list_expired().await {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(error = %e, "sweeper: list_expired failed");
                return;
            }
        };

        if expired.is_empty() {
            return;
        }

        let mut swept_ids = Vec::with_capacity(expired.len());

        for file in &expired {
            let keys: Vec<String> = (0..file.chunk_count)
                .map(|i| format!("{}/{}.enc", file.id, i))
                .collect();

            match self.s3.delete_objects(&keys).await {
                Ok(failed) => {
                    for key in &failed {
                        tracing::warn!(file_id = %file.id, key = %key, "sweeper: blob delete failed, recording orphan");
                        if let Err(e) = db::orphans::record(
                            self.registry.pool(),
                            key,
                            &file.id,
                            "delete_objects reported failure",
                        )
                        .await
                        {
                            tracing::error!(error = %e, "sweeper: failed to record orphan blob");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(file_id = %file.id, error = %e, "sweeper: bulk delete request failed entirely");
                }
            }

            swept_ids.push(file.id.clone());
        }

        match self.registry.mark_expired(&swept_ids).await {
            Ok(count) => {
                if count > 0 {
                    tracing::info!(count, "sweeper: expired files this tick");
                }
            }
            Err(e) => tracing::error!(error = %e, "sweeper: mark_expired failed"),
        }
    }
}
