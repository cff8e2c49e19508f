//! Route modules for the share server

pub mod download;
pub mod health;
pub mod upload;

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;
use serde::Serialize;

/// Envelope every non-stream response is wrapped in (spec §6).
#[derive(Serialize)]
pub struct ApiEnvelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn ok<T: Serialize>(data: T) -> axum::Json<ApiEnvelope<T>> {
    axum::Json(ApiEnvelope {
        success: true,
        message: None,
        data: Some(data),
    })
}

pub fn ok_empty() -> axum::Json<ApiEnvelope<()>> {
    axum::Json(ApiEnvelope {
        success: true,
        message: None,
        data: None,
    })
}

/// Prefers `X-Forwarded-For` (first hop), then `X-Real-IP`, else the peer
/// address from the connection itself.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(value) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = value.split(',').next() {
            let candidate = first.trim();
            if candidate.parse::<IpAddr>().is_ok() {
                return candidate.to_string();
            }
        }
    }

    if let Some(value) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let candidate = value.trim();
        if candidate.parse::<IpAddr>().is_ok() {
            return candidate.to_string();
        }
    }

    peer.ip().to_string()
}

/// Extracts the bearer token from `Authorization: Bearer {token}`, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(|s| s.trim().to_string())
}
