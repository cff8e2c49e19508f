//! Configuration loading
//!
//! All settings are read from the environment (optionally via a `.env`
//! file loaded by `dotenvy`) with sane defaults, so the server runs
//! out of the box in a self-hosted deployment.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub limits: LimitsConfig,
    pub sweeper: SweeperConfig,
    pub rate_limits: RateLimitConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Per-chunk ciphertext ceiling, closing the "hostile client opens one
    /// giant chunk" Open Question in the spec.
    pub max_chunk_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub force_path_style: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_file_size: u64,
    pub default_max_downloads: i64,
    pub default_expires_in_hours: i64,
}

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub upload_init: BucketConfig,
    pub chunk_upload: BucketConfig,
    pub upload_finalize: BucketConfig,
    pub metadata_read: BucketConfig,
    pub chunk_download: BucketConfig,
    pub download_complete: BucketConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct BucketConfig {
    pub limit: u32,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from the environment, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            server: ServerConfig {
                port: env_parse("SERVER_PORT", 8080),
                max_chunk_bytes: env_parse("MAX_CHUNK_BYTES", 64 * 1024 * 1024),
            },
            storage: StorageConfig {
                endpoint: env_string("S3_ENDPOINT", "http://127.0.0.1:9000"),
                bucket: env_string("S3_BUCKET", "cryptshare"),
                access_key: env_string("S3_ACCESS_KEY", "minioadmin"),
                secret_key: env_string("S3_SECRET_KEY", "minioadmin"),
                region: env_string("S3_REGION", "us-east-1"),
                force_path_style: env_parse("S3_FORCE_PATH_STYLE", true),
            },
            database: DatabaseConfig {
                url: env_string("DATABASE_URL", "sqlite://./data/files.db"),
            },
            limits: LimitsConfig {
                max_file_size: env_parse("MAX_FILE_SIZE", 5 * 1024 * 1024 * 1024),
                default_max_downloads: env_parse("DEFAULT_MAX_DOWNLOADS", 5),
                default_expires_in_hours: env_parse("DEFAULT_EXPIRES_IN_HOURS", 72),
            },
            sweeper: SweeperConfig {
                interval: Duration::from_secs(env_parse("SWEEP_INTERVAL_SECS", 300)),
            },
            rate_limits: RateLimitConfig {
                upload_init: BucketConfig {
                    limit: env_parse("RATE_LIMIT_UPLOAD_INIT", 10),
                    window: Duration::from_secs(60),
                },
                chunk_upload: BucketConfig {
                    limit: env_parse("RATE_LIMIT_CHUNK_UPLOAD", 60),
                    window: Duration::from_secs(60),
                },
                upload_finalize: BucketConfig {
                    limit: env_parse("RATE_LIMIT_UPLOAD_FINALIZE", 20),
                    window: Duration::from_secs(60),
                },
                metadata_read: BucketConfig {
                    limit: env_parse("RATE_LIMIT_METADATA_READ", 30),
                    window: Duration::from_secs(60),
                },
                chunk_download: BucketConfig {
                    limit: env_parse("RATE_LIMIT_CHUNK_DOWNLOAD", 110),
                    window: Duration::from_secs(60),
                },
                download_complete: BucketConfig {
                    limit: env_parse("RATE_LIMIT_DOWNLOAD_COMPLETE", 20),
                    window: Duration::from_secs(60),
                },
            },
            cors: CorsConfig {
                allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                    .ok()
                    .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                    .unwrap_or_else(|| vec!["*".to_string()]),
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        // Safe because every key is read with a default above; an empty
        // environment always parses successfully.
        Self::from_env().expect("default config must always build")
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
