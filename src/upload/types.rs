//! Upload Coordinator domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    pub encrypted_filename: String,
    pub encrypted_mime_type: String,
    pub salt: String,
    pub pbkdf2_iterations: i64,
    pub total_size: i64,
    pub chunk_size: i64,
    pub chunk_count: i64,
    pub max_downloads: Option<i64>,
    pub expires_in_hours: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResponse {
    pub file_id: String,
    pub share_id: String,
    pub upload_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    pub share_id: String,
    pub deletion_token: String,
}
