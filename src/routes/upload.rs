//! Upload routes
//!
//! `POST /files/upload/init`, `POST /files/{file_id}/chunks`,
//! `POST /files/{file_id}/finalize`.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Multipart, Path, State},
    routing::post,
    Json, Router,
};

use crate::admission::EndpointClass;
use crate::error::{Result, ShareError};
use crate::state::AppState;
use crate::upload::{InitRequest, InitResponse};

use super::{bearer_token, client_ip, ok};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload/init", post(init))
        .route("/:file_id/chunks", post(upload_chunk))
        .route("/:file_id/finalize", post(finalize))
}

async fn init(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: axum::http::HeaderMap,
    Json(req): Json<InitRequest>,
) -> Result<Json<super::ApiEnvelope<InitResponse>>> {
    let ip = client_ip(&headers, peer);
    state
        .admission()
        .check(EndpointClass::UploadInit, ip.parse().unwrap_or(peer.ip()))?;

    let response = state.coordinator().init(req, &ip).await?;
    Ok(ok(response))
}

struct ChunkParts {
    chunk_index: Option<i64>,
    hash: Option<String>,
    chunk: Option<Vec<u8>>,
}

async fn upload_chunk(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(file_id): Path<String>,
    headers: axum::http::HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<super::ApiEnvelope<crate::chunk::ChunkReceipt>>> {
    let ip = client_ip(&headers, peer);
    state
        .admission()
        .check(EndpointClass::ChunkUpload, ip.parse().unwrap_or(peer.ip()))?;

    let token = bearer_token(&headers).ok_or(ShareError::Unauthorized)?;
    state.coordinator().authorize(&file_id, &token).await?;

    let mut parts = ChunkParts {
        chunk_index: None,
        hash: None,
        chunk: None,
    };
    let mut filename_hint: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ShareError::Invalid(format!("malformed multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "chunk_index" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ShareError::Invalid(format!("chunk_index: {e}")))?;
                parts.chunk_index = text
                    .parse::<i64>()
                    .ok()
                    .filter(|i| *i >= 0);
            }
            "hash" => {
                parts.hash = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ShareError::Invalid(format!("hash: {e}")))?,
                );
            }
            "chunk" => {
                filename_hint = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ShareError::Invalid(format!("chunk: {e}")))?;
                parts.chunk = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let chunk_index = parts
        .chunk_index
        .ok_or_else(|| ShareError::Invalid("missing chunk_index part".into()))?;
    let hash = parts.hash.ok_or_else(|| ShareError::Invalid("missing hash part".into()))?;
    let chunk = parts.chunk.ok_or_else(|| ShareError::Invalid("missing chunk part".into()))?;

    let receipt = state
        .chunk_engine()
        .process_upload(&file_id, chunk_index, chunk, &hash, filename_hint.as_deref())
        .await?;

    Ok(ok(receipt))
}

async fn finalize(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(file_id): Path<String>,
    headers: axum::http::HeaderMap,
) -> Result<Json<super::ApiEnvelope<crate::upload::FinalizeResponse>>> {
    let ip = client_ip(&headers, peer);
    state
        .admission()
        .check(EndpointClass::UploadFinalize, ip.parse().unwrap_or(peer.ip()))?;

    let token = bearer_token(&headers).ok_or(ShareError::Unauthorized)?;
    let response = state.coordinator().finalize(&file_id, &token).await?;
    Ok(ok(response))
}
