//! Application-level face database.
//!
//! `FaceDb` enforces the fixed embedding dimensionality, generates record
//! ids, and translates between application concepts and index operations.
//! It performs no retries, batching, or caching; index failures propagate
//! unchanged.

use crate::error::StoreError;
use crate::index::{FacePayload, VectorIndex, LIST_LIMIT};
use rollcall_core::{Embedding, EMBEDDING_DIM};
use std::sync::Arc;
use uuid::Uuid;

/// Minimum cosine similarity for two embeddings to count as the same person,
/// when the caller does not supply a threshold.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.55;

/// One stored face record (vector omitted).
#[derive(Debug, Clone)]
pub struct FaceRecord {
    pub id: String,
    pub name: String,
    pub personnel_id: Option<String>,
}

/// Best match for a probe embedding.
#[derive(Debug, Clone)]
pub struct FaceMatch {
    pub name: String,
    pub score: f32,
    pub personnel_id: Option<String>,
}

impl FaceMatch {
    /// Identity used for attendance marking and cooldown tracking:
    /// personnel id when present, display name otherwise.
    pub fn person_key(&self) -> &str {
        self.personnel_id.as_deref().unwrap_or(&self.name)
    }
}

/// Aggregate counts over the collection.
#[derive(Debug, Clone)]
pub struct DbStats {
    pub total_faces: u64,
    pub total_people: usize,
    pub people: Vec<String>,
}

/// Face database over a pluggable vector index.
#[derive(Clone)]
pub struct FaceDb {
    index: Arc<dyn VectorIndex>,
}

impl FaceDb {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    /// Create the backing collection when absent.
    pub async fn ensure_ready(&self) -> Result<(), StoreError> {
        self.index.ensure_ready().await
    }

    /// Probe whether the index is reachable.
    pub async fn is_connected(&self) -> bool {
        self.index.count().await.is_ok()
    }

    fn check_dimensions(embedding: &Embedding) -> Result<(), StoreError> {
        if embedding.values.len() != EMBEDDING_DIM {
            return Err(StoreError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                got: embedding.values.len(),
            });
        }
        Ok(())
    }

    /// Store a face embedding under a person's name. Returns the generated
    /// record id. Duplicate names are allowed: they are multiple records
    /// for one person.
    pub async fn add(
        &self,
        name: &str,
        embedding: &Embedding,
        personnel_id: Option<String>,
    ) -> Result<String, StoreError> {
        Self::check_dimensions(embedding)?;

        let id = Uuid::new_v4().to_string();
        let payload = FacePayload {
            name: name.to_string(),
            personnel_id,
        };

        self.index
            .upsert(&id, embedding.values.clone(), payload)
            .await?;

        tracing::info!(name, id = %id, "face added");
        Ok(id)
    }

    /// Find the single nearest stored face with similarity at or above
    /// `threshold`, or `None` when nothing qualifies.
    pub async fn search(
        &self,
        embedding: &Embedding,
        threshold: f32,
    ) -> Result<Option<FaceMatch>, StoreError> {
        Self::check_dimensions(embedding)?;

        let hit = self.index.search(embedding.values.clone(), threshold).await?;

        Ok(hit.map(|h| FaceMatch {
            name: h.payload.name,
            score: h.score,
            personnel_id: h.payload.personnel_id,
        }))
    }

    /// Sorted, deduplicated names of everyone in the database.
    pub async fn list_people(&self) -> Result<Vec<String>, StoreError> {
        let records = self.index.list(LIST_LIMIT).await?;

        let mut names: Vec<String> = records.into_iter().map(|(_, p)| p.name).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Every stored face record (vector omitted).
    pub async fn list_faces(&self) -> Result<Vec<FaceRecord>, StoreError> {
        let records = self.index.list(LIST_LIMIT).await?;

        Ok(records
            .into_iter()
            .map(|(id, payload)| FaceRecord {
                id,
                name: payload.name,
                personnel_id: payload.personnel_id,
            })
            .collect())
    }

    /// Delete every record for `name`. Returns false when no record existed.
    pub async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let known = self.list_people().await?;
        if !known.iter().any(|n| n == name) {
            return Ok(false);
        }

        self.index.delete_by_name(name).await?;
        tracing::info!(name, "deleted all faces for person");
        Ok(true)
    }

    pub async fn stats(&self) -> Result<DbStats, StoreError> {
        let total_faces = self.index.count().await?;
        let people = self.list_people().await?;

        Ok(DbStats {
            total_faces,
            total_people: people.len(),
            people,
        })
    }
}
