//! Shared error type for the share lifecycle engine
//!
//! Every core component (Share Registry, Chunk Engine, Upload Coordinator,
//! Admission Gate) reports failures through `ShareError`. The HTTP layer
//! only has to map one enum to a status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("chunk hash mismatch")]
    HashMismatch,

    #[error("file is not accepting chunks")]
    NotUploading,

    #[error("chunk already uploaded")]
    AlreadyUploaded,

    #[error("missing or malformed bearer token")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("download limit reached")]
    DownloadLimitReached,

    #[error("share has expired")]
    Expired,

    #[error("file is not ready for download")]
    NotReady,

    #[error("upload is missing {0} chunk(s)")]
    Incomplete(usize),

    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ShareError>;

impl From<sqlx::Error> for ShareError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ShareError::NotFound,
            other => ShareError::Internal(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct Envelope {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for ShareError {
    fn into_response(self) -> Response {
        let status = match &self {
            ShareError::Invalid(_) => StatusCode::BAD_REQUEST,
            ShareError::HashMismatch => StatusCode::BAD_REQUEST,
            ShareError::NotUploading => StatusCode::BAD_REQUEST,
            ShareError::AlreadyUploaded => StatusCode::CONFLICT,
            ShareError::Unauthorized => StatusCode::UNAUTHORIZED,
            ShareError::NotFound => StatusCode::NOT_FOUND,
            ShareError::DownloadLimitReached => StatusCode::FORBIDDEN,
            ShareError::Expired => StatusCode::NOT_FOUND,
            ShareError::NotReady => StatusCode::BAD_REQUEST,
            ShareError::Incomplete(_) => StatusCode::BAD_REQUEST,
            ShareError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ShareError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let ShareError::Internal(ref msg) = self {
            tracing::error!(error = %msg, "internal error");
        }

        let message = match &self {
            ShareError::RateLimited { .. } => {
                "Rate limit exceeded. Please try again later.".to_string()
            }
            other => other.to_string(),
        };

        let mut response = (
            status,
            Json(Envelope {
                success: false,
                message: Some(message),
            }),
        )
            .into_response();

        if let ShareError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }

        response
    }
}
