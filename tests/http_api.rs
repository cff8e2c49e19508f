//! HTTP surface integration tests
//!
//! Exercises the router end-to-end against an in-memory SQLite database.
//! Chunk upload/download isn't covered here since it needs a live
//! S3-compatible endpoint; that boundary is exercised only by
//! `ChunkEngine`'s own unit tests (the same split the teacher draws between
//! local-storage and S3-backed chunk stores).

use std::time::Duration;

use axum::Router;
use axum_test::{TestServer, TestServerConfig};
use serde_json::json;

use cryptshare_server::config::{
    BucketConfig, Config, CorsConfig, DatabaseConfig, LimitsConfig, RateLimitConfig, ServerConfig,
    StorageConfig, SweeperConfig,
};
use cryptshare_server::routes;
use cryptshare_server::state::AppState;
use cryptshare_server::storage::S3Client;

fn test_config(upload_init_limit: u32) -> Config {
    let bucket = BucketConfig {
        limit: upload_init_limit,
        window: Duration::from_secs(60),
    };
    Config {
        server: ServerConfig {
            port: 0,
            max_chunk_bytes: 64 * 1024 * 1024,
        },
        storage: StorageConfig {
            endpoint: "http://127.0.0.1:9123".into(),
            bucket: "cryptshare-test".into(),
            access_key: "test".into(),
            secret_key: "test".into(),
            region: "us-east-1".into(),
            force_path_style: true,
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".into(),
        },
        limits: LimitsConfig {
            max_file_size: 5 * 1024 * 1024 * 1024,
            default_max_downloads: 5,
            default_expires_in_hours: 72,
        },
        sweeper: SweeperConfig {
            interval: Duration::from_secs(300),
        },
        rate_limits: RateLimitConfig {
            upload_init: bucket,
            chunk_upload: bucket,
            upload_finalize: bucket,
            metadata_read: bucket,
            chunk_download: bucket,
            download_complete: bucket,
        },
        cors: CorsConfig {
            allowed_origins: vec!["*".into()],
        },
    }
}

async fn test_server(upload_init_limit: u32) -> TestServer {
    let config = test_config(upload_init_limit);
    let s3_client = S3Client::new(&config.storage).await.unwrap();
    let db_pool = cryptshare_server::db::create_pool(&config.database.url)
        .await
        .unwrap();

    let app_state = AppState::new(config, s3_client, db_pool);

    let app: Router = Router::new()
        .nest("/health", routes::health::router())
        .nest("/api/v1/health", routes::health::router())
        .nest("/api/v1/files", routes::upload::router())
        .nest("/api/v1/download", routes::download::router())
        .with_state(app_state);

    let server_config = TestServerConfig {
        transport: Some(axum_test::Transport::HttpRandomPort),
        ..TestServerConfig::default()
    };
    TestServer::new_with_config(app, server_config).unwrap()
}

fn valid_init_body() -> serde_json::Value {
    json!({
        "encryptedFilename": "ciphertext-name",
        "encryptedMimeType": "ciphertext-mime",
        "salt": "c2FsdHNhbHRzYWx0c2FsdA==",
        "pbkdf2Iterations": 100_000,
        "totalSize": 1_048_576,
        "chunkSize": 262_144,
        "chunkCount": 4,
        "maxDownloads": 5,
        "expiresInHours": 24,
    })
}

#[tokio::test]
async fn health_check_reports_healthy() {
    let server = test_server(10).await;
    let response = server.get("/health").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn upload_init_accepts_consistent_geometry() {
    let server = test_server(10).await;
    let response = server
        .post("/api/v1/files/upload/init")
        .json(&valid_init_body())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["success"].as_bool().unwrap());
    assert_eq!(body["data"]["shareId"].as_str().unwrap().len(), 12);
}

#[tokio::test]
async fn upload_init_rejects_bad_geometry() {
    let server = test_server(10).await;
    let mut bad_body = valid_init_body();
    bad_body["chunkCount"] = json!(3);

    let response = server.post("/api/v1/files/upload/init").json(&bad_body).await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn upload_init_is_rate_limited_after_the_class_cap() {
    let server = test_server(2).await;

    for _ in 0..2 {
        let response = server
            .post("/api/v1/files/upload/init")
            .json(&valid_init_body())
            .await;
        response.assert_status_ok();
    }

    let response = server
        .post("/api/v1/files/upload/init")
        .json(&valid_init_body())
        .await;
    response.assert_status(axum::http::StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn chunk_upload_requires_bearer_token() {
    let server = test_server(10).await;
    let init_response = server
        .post("/api/v1/files/upload/init")
        .json(&valid_init_body())
        .await;
    let body: serde_json::Value = init_response.json();
    let file_id = body["data"]["fileId"].as_str().unwrap();

    let response = server
        .post(&format!("/api/v1/files/{file_id}/finalize"))
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn download_metadata_of_unknown_share_is_not_found() {
    let server = test_server(10).await;
    let response = server.get("/api/v1/download/doesnotexist12/metadata").await;
    response.assert_status_not_found();
}
