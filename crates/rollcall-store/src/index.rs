//! Vector index contract shared by the Qdrant and in-memory backends.

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Payload stored alongside each face vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacePayload {
    pub name: String,
    pub personnel_id: Option<String>,
}

/// Best match returned by a similarity search.
#[derive(Debug, Clone)]
pub struct ScoredHit {
    pub id: String,
    pub score: f32,
    pub payload: FacePayload,
}

/// Upper bound on records fetched by a listing scroll.
pub const LIST_LIMIT: usize = 10_000;

/// Storage operations the face database needs from a vector index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the backing collection when absent.
    async fn ensure_ready(&self) -> Result<(), StoreError>;

    async fn upsert(
        &self,
        id: &str,
        vector: Vec<f32>,
        payload: FacePayload,
    ) -> Result<(), StoreError>;

    /// Single best hit with cosine score at or above `threshold`.
    async fn search(
        &self,
        vector: Vec<f32>,
        threshold: f32,
    ) -> Result<Option<ScoredHit>, StoreError>;

    /// All stored `(id, payload)` pairs, up to `limit`, vectors omitted.
    async fn list(&self, limit: usize) -> Result<Vec<(String, FacePayload)>, StoreError>;

    /// Remove every record whose payload name equals `name`.
    async fn delete_by_name(&self, name: &str) -> Result<(), StoreError>;

    /// Total number of stored records.
    async fn count(&self) -> Result<u64, StoreError>;
}
