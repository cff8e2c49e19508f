//! Admission Gate
//!
//! Per-endpoint-class, per-IP token buckets. Buckets are in-process shared
//! state behind a `DashMap`, mutation-safe under concurrent request
//! dispatch with no global lock.

use std::net::IpAddr;
use std::time::Duration;

use dashmap::DashMap;

use crate::clock::SharedClock;
use crate::config::{BucketConfig, RateLimitConfig};
use crate::error::{Result, ShareError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    UploadInit,
    ChunkUpload,
    UploadFinalize,
    MetadataRead,
    ChunkDownload,
    DownloadComplete,
}

struct Bucket {
    window_start_millis: i64,
    count: u32,
}

pub struct AdmissionGate {
    config: RateLimitConfig,
    clock: SharedClock,
    buckets: DashMap<(EndpointClass, IpAddr), Bucket>,
}

impl AdmissionGate {
    pub fn new(config: RateLimitConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            buckets: DashMap::new(),
        }
    }

    fn bucket_config(&self, class: EndpointClass) -> BucketConfig {
        match class {
            EndpointClass::UploadInit => self.config.upload_init,
            EndpointClass::ChunkUpload => self.config.chunk_upload,
            EndpointClass::UploadFinalize => self.config.upload_finalize,
            EndpointClass::MetadataRead => self.config.metadata_read,
            EndpointClass::ChunkDownload => self.config.chunk_download,
            EndpointClass::DownloadComplete => self.config.download_complete,
        }
    }

    /// Admits or rejects a request. Different IPs never share a bucket;
    /// same-IP bursts beyond the class cap fail with `RateLimited`.
    pub fn check(&self, class: EndpointClass, ip: IpAddr) -> Result<()> {
        let bucket_config = self.bucket_config(class);
        let now = self.clock.now().timestamp_millis();
        let window_millis = bucket_config.window.as_millis() as i64;

        let mut entry = self
            .buckets
            .entry((class, ip))
            .or_insert_with(|| Bucket {
                window_start_millis: now,
                count: 0,
            });

        if now - entry.window_start_millis >= window_millis {
            entry.window_start_millis = now;
            entry.count = 0;
        }

        if entry.count >= bucket_config.limit {
            let retry_after_secs = bucket_config.window.as_secs().max(1);
            return Err(ShareError::RateLimited { retry_after_secs });
        }

        entry.count += 1;
        Ok(())
    }

    /// Default retry hint for a class, used when rejecting before a bucket
    /// exists (e.g. malformed request short-circuited before `check`).
    pub fn window_for(&self, class: EndpointClass) -> Duration {
        self.bucket_config(class).window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use chrono::Utc;
    use std::sync::Arc;

    fn test_config() -> RateLimitConfig {
        RateLimitConfig {
            upload_init: BucketConfig { limit: 2, window: Duration::from_secs(60) },
            chunk_upload: BucketConfig { limit: 2, window: Duration::from_secs(60) },
            upload_finalize: BucketConfig { limit: 2, window: Duration::from_secs(60) },
            metadata_read: BucketConfig { limit: 2, window: Duration::from_secs(60) },
            chunk_download: BucketConfig { limit: 2, window: Duration::from_secs(60) },
            download_complete: BucketConfig { limit: 2, window: Duration::from_secs(60) },
        }
    }

    #[test]
    fn same_ip_burst_is_throttled_after_limit() {
        let clock = Arc::new(FakeClock::new(Utc::now()));
        let gate = AdmissionGate::new(test_config(), clock);
        let ip: IpAddr = "203.0.113.9".parse().unwrap();

        assert!(gate.check(EndpointClass::UploadInit, ip).is_ok());
        assert!(gate.check(EndpointClass::UploadInit, ip).is_ok());

        let err = gate.check(EndpointClass::UploadInit, ip).unwrap_err();
        assert!(matches!(err, ShareError::RateLimited { .. }));
    }

    #[test]
    fn distinct_ips_do_not_interfere() {
        let clock = Arc::new(FakeClock::new(Utc::now()));
        let gate = AdmissionGate::new(test_config(), clock);
        let a: IpAddr = "203.0.113.9".parse().unwrap();
        let b: IpAddr = "198.51.100.4".parse().unwrap();

        assert!(gate.check(EndpointClass::UploadInit, a).is_ok());
        assert!(gate.check(EndpointClass::UploadInit, a).is_ok());
        assert!(gate.check(EndpointClass::UploadInit, a).is_err());

        assert!(gate.check(EndpointClass::UploadInit, b).is_ok());
    }

    #[test]
    fn bucket_resets_after_window_elapses() {
        let clock = Arc::new(FakeClock::new(Utc::now()));
        let gate = AdmissionGate::new(test_config(), clock.clone());
        let ip: IpAddr = "203.0.113.9".parse().unwrap();

        assert!(gate.check(EndpointClass::ChunkUpload, ip).is_ok());
        assert!(gate.check(EndpointClass::ChunkUpload, ip).is_ok());
        assert!(gate.check(EndpointClass::ChunkUpload, ip).is_err());

        clock.advance(chrono::Duration::seconds(61));

        assert!(gate.check(EndpointClass::ChunkUpload, ip).is_ok());
    }

    #[test]
    fn endpoint_classes_are_isolated_per_ip() {
        let clock = Arc::new(FakeClock::new(Utc::now()));
        let gate = AdmissionGate::new(test_config(), clock);
        let ip: IpAddr = "203.0.113.9".parse().unwrap();

        assert!(gate.check(EndpointClass::UploadInit, ip).is_ok());
        assert!(gate.check(EndpointClass::UploadInit, ip).is_ok());
        assert!(gate.check(EndpointClass::UploadInit, ip).is_err());

        // A different class for the same IP has its own bucket.
        assert!(gate.check(EndpointClass::MetadataRead, ip).is_ok());
    }
}
