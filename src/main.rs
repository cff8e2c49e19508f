//! Cryptshare Server
//!
//! A self-hosted, end-to-end encrypted file-sharing server with S3-compatible
//! object storage and a background expiry sweeper.

use std::net::SocketAddr;

use axum::Router;
use tokio::signal;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cryptshare_server::config::Config;
use cryptshare_server::db;
use cryptshare_server::routes;
use cryptshare_server::state::AppState;
use cryptshare_server::storage::S3Client;
use cryptshare_server::sweeper::Sweeper;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cryptshare_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("starting cryptshare-server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("object store endpoint: {}", config.storage.endpoint);
    tracing::info!("object store bucket: {}", config.storage.bucket);

    let s3_client = S3Client::new(&config.storage)
        .await
        .expect("failed to initialize object store client");

    let db_pool = db::create_pool(&config.database.url)
        .await
        .expect("failed to initialize database");
    tracing::info!("database initialized at {}", config.database.url);

    let app_state = AppState::new(config.clone(), s3_client.clone(), db_pool.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper = Sweeper::new(
        app_state.registry().clone(),
        s3_client,
        config.sweeper.interval,
    );
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown_rx));

    let cors = build_cors(&config.cors.allowed_origins);

    let app = Router::new()
        .nest("/health", routes::health::router())
        .nest("/api/v1/health", routes::health::router())
        .nest("/api/v1/files", routes::upload::router())
        .nest("/api/v1/download", routes::download::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("cryptshare-server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .unwrap();

    let _ = shutdown_tx.send(true);
    let _ = sweeper_handle.await;

    tracing::info!("server shutdown complete");
}

fn build_cors(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
