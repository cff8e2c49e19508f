//! Chunk Engine
//!
//! Persists and retrieves ciphertext chunks, enforcing per-chunk
//! idempotence and hash integrity against the object store.

mod engine;
mod types;

pub use engine::ChunkEngine;
pub use types::ChunkReceipt;
