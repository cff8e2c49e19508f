//! Upload Coordinator
//!
//! Owns the upload state machine (init → chunking → finalized) and
//! validates geometry; the Chunk Engine owns chunk ingestion itself.

mod coordinator;
mod types;

pub use coordinator::{hash_token, UploadCoordinator};
pub use types::{FinalizeResponse, InitRequest, InitResponse};
