//! Chunk Engine domain types

use serde::Serialize;

/// Returned from `ProcessUpload` on success.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkReceipt {
    pub chunk_index: i64,
    pub status: &'static str,
    pub hash: String,
}
