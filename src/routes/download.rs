//! Download routes
//!
//! `GET /download/{share_id}/metadata`, `GET
//! /download/{share_id}/chunks/{chunk_index}`, `POST
//! /download/{share_id}/complete`.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use crate::admission::EndpointClass;
use crate::error::{Result, ShareError};
use crate::share::FileMetadata;
use crate::state::AppState;

use super::{client_ip, ok, ok_empty};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:share_id/metadata", get(metadata))
        .route("/:share_id/chunks/:chunk_index", get(download_chunk))
        .route("/:share_id/complete", post(complete))
}

async fn metadata(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(share_id): Path<String>,
    headers: axum::http::HeaderMap,
) -> Result<Json<super::ApiEnvelope<FileMetadata>>> {
    let ip = client_ip(&headers, peer);
    state
        .admission()
        .check(EndpointClass::MetadataRead, ip.parse().unwrap_or(peer.ip()))?;

    let meta = state.registry().get_metadata_for_download(&share_id).await?;
    Ok(ok(meta))
}

async fn download_chunk(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path((share_id, chunk_index)): Path<(String, i64)>,
    headers: axum::http::HeaderMap,
) -> Result<Response> {
    let ip = client_ip(&headers, peer);
    state
        .admission()
        .check(EndpointClass::ChunkDownload, ip.parse().unwrap_or(peer.ip()))?;

    let stream = state.chunk_engine().download_chunk(&share_id, chunk_index).await?;
    let bytes = stream
        .collect()
        .await
        .map_err(|e| ShareError::Internal(format!("reading chunk stream: {e}")))?
        .into_bytes();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        Body::from(bytes),
    )
        .into_response())
}

async fn complete(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(share_id): Path<String>,
    headers: axum::http::HeaderMap,
) -> Result<Json<super::ApiEnvelope<()>>> {
    let ip = client_ip(&headers, peer);
    state
        .admission()
        .check(EndpointClass::DownloadComplete, ip.parse().unwrap_or(peer.ip()))?;

    state.registry().complete_download(&share_id).await?;
    Ok(ok_empty())
}
