//! Qdrant-backed vector index.
//!
//! Stores face embeddings in a single collection ("faces") with 512-dim
//! cosine vectors. The collection is created on first use. Any client
//! failure surfaces as [`StoreError::Connection`]; the wrapper performs no
//! retries.

use crate::error::StoreError;
use crate::index::{FacePayload, ScoredHit, VectorIndex};
use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointId,
    PointStruct, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, Value,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use rollcall_core::EMBEDDING_DIM;
use std::collections::HashMap;

/// Name of the Qdrant collection holding face embeddings.
pub const COLLECTION_NAME: &str = "faces";

pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
}

impl QdrantIndex {
    /// Build a client for a Qdrant gRPC endpoint (e.g. `http://localhost:6334`).
    ///
    /// The connection is lazy; the first operation surfaces reachability
    /// problems.
    pub fn connect(url: &str, api_key: Option<String>) -> Result<Self, StoreError> {
        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder.build().map_err(qerr)?;

        tracing::info!(url, "qdrant client configured");

        Ok(Self {
            client,
            collection: COLLECTION_NAME.to_string(),
        })
    }

    /// Use a collection name other than the default.
    pub fn with_collection(mut self, name: impl Into<String>) -> Self {
        self.collection = name.into();
        self
    }
}

fn qerr(e: QdrantError) -> StoreError {
    StoreError::Connection(e.to_string())
}

fn point_id_string(id: Option<PointId>) -> String {
    match id.and_then(|p| p.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    })
}

fn decode_payload(payload: &HashMap<String, Value>) -> Result<FacePayload, StoreError> {
    let name = payload_str(payload, "name")
        .ok_or_else(|| StoreError::Backend("stored point has no name in payload".into()))?;

    Ok(FacePayload {
        name,
        personnel_id: payload_str(payload, "personnel_id"),
    })
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_ready(&self) -> Result<(), StoreError> {
        let exists = self
            .client
            .collection_exists(self.collection.as_str())
            .await
            .map_err(qerr)?;

        if !exists {
            tracing::info!(collection = %self.collection, dims = EMBEDDING_DIM, "creating collection");
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(self.collection.as_str()).vectors_config(
                        VectorParamsBuilder::new(EMBEDDING_DIM as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(qerr)?;
        }

        Ok(())
    }

    async fn upsert(
        &self,
        id: &str,
        vector: Vec<f32>,
        payload: FacePayload,
    ) -> Result<(), StoreError> {
        let mut point_payload = Payload::new();
        point_payload.insert("name", payload.name);
        if let Some(personnel_id) = payload.personnel_id {
            point_payload.insert("personnel_id", personnel_id);
        }

        let point = PointStruct::new(id.to_string(), vector, point_payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection.as_str(), vec![point]).wait(true))
            .await
            .map_err(qerr)?;

        Ok(())
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        threshold: f32,
    ) -> Result<Option<ScoredHit>, StoreError> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(self.collection.as_str(), vector, 1)
                    .score_threshold(threshold)
                    .with_payload(true),
            )
            .await
            .map_err(qerr)?;

        let Some(hit) = response.result.into_iter().next() else {
            return Ok(None);
        };

        let payload = decode_payload(&hit.payload)?;

        Ok(Some(ScoredHit {
            id: point_id_string(hit.id),
            score: hit.score,
            payload,
        }))
    }

    async fn list(&self, limit: usize) -> Result<Vec<(String, FacePayload)>, StoreError> {
        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(self.collection.as_str())
                    .limit(limit as u32)
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await
            .map_err(qerr)?;

        let mut records = Vec::with_capacity(response.result.len());
        for point in response.result {
            let payload = decode_payload(&point.payload)?;
            records.push((point_id_string(point.id), payload));
        }

        Ok(records)
    }

    async fn delete_by_name(&self, name: &str) -> Result<(), StoreError> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(self.collection.as_str())
                    .points(Filter::must([Condition::matches(
                        "name",
                        name.to_string(),
                    )]))
                    .wait(true),
            )
            .await
            .map_err(qerr)?;

        Ok(())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let info = self
            .client
            .collection_info(self.collection.as_str())
            .await
            .map_err(qerr)?;

        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_value(s: &str) -> Value {
        Value {
            kind: Some(Kind::StringValue(s.to_string())),
        }
    }

    #[test]
    fn test_decode_payload_full() {
        let mut payload = HashMap::new();
        payload.insert("name".to_string(), string_value("alice"));
        payload.insert("personnel_id".to_string(), string_value("emp-17"));

        let decoded = decode_payload(&payload).unwrap();
        assert_eq!(decoded.name, "alice");
        assert_eq!(decoded.personnel_id.as_deref(), Some("emp-17"));
    }

    #[test]
    fn test_decode_payload_without_personnel_id() {
        let mut payload = HashMap::new();
        payload.insert("name".to_string(), string_value("bob"));

        let decoded = decode_payload(&payload).unwrap();
        assert_eq!(decoded.name, "bob");
        assert!(decoded.personnel_id.is_none());
    }

    #[test]
    fn test_decode_payload_missing_name_is_error() {
        let payload = HashMap::new();
        assert!(decode_payload(&payload).is_err());
    }

    #[test]
    fn test_point_id_string_uuid() {
        let id = PointId {
            point_id_options: Some(PointIdOptions::Uuid("abc-123".to_string())),
        };
        assert_eq!(point_id_string(Some(id)), "abc-123");
    }

    #[test]
    fn test_point_id_string_num() {
        let id = PointId {
            point_id_options: Some(PointIdOptions::Num(42)),
        };
        assert_eq!(point_id_string(Some(id)), "42");
    }
}
