//! In-process vector index: a map of stored vectors plus a full cosine scan.
//!
//! Backs tests and offline single-machine use; the Qdrant index is the
//! production backend.

use crate::error::StoreError;
use crate::index::{FacePayload, ScoredHit, VectorIndex};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryIndex {
    points: RwLock<HashMap<String, (Vec<f32>, FacePayload)>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cosine similarity over raw vectors. Zero-norm input scores 0.0.
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_ready(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert(
        &self,
        id: &str,
        vector: Vec<f32>,
        payload: FacePayload,
    ) -> Result<(), StoreError> {
        self.points
            .write()
            .await
            .insert(id.to_string(), (vector, payload));
        Ok(())
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        threshold: f32,
    ) -> Result<Option<ScoredHit>, StoreError> {
        let points = self.points.read().await;

        let mut best: Option<ScoredHit> = None;

        // Linear scan over every entry; no early exit.
        for (id, (stored, payload)) in points.iter() {
            let score = cosine(&vector, stored);
            let better = best.as_ref().map(|b| score > b.score).unwrap_or(true);
            if better {
                best = Some(ScoredHit {
                    id: id.clone(),
                    score,
                    payload: payload.clone(),
                });
            }
        }

        Ok(best.filter(|hit| hit.score >= threshold))
    }

    async fn list(&self, limit: usize) -> Result<Vec<(String, FacePayload)>, StoreError> {
        let points = self.points.read().await;
        Ok(points
            .iter()
            .take(limit)
            .map(|(id, (_, payload))| (id.clone(), payload.clone()))
            .collect())
    }

    async fn delete_by_name(&self, name: &str) -> Result<(), StoreError> {
        self.points
            .write()
            .await
            .retain(|_, (_, payload)| payload.name != name);
        Ok(())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.points.read().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![0.5, 0.5, 0.0];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_search_returns_best_of_several() {
        let index = MemoryIndex::new();
        let payload = |name: &str| FacePayload {
            name: name.to_string(),
            personnel_id: None,
        };

        index.upsert("1", vec![1.0, 0.0, 0.0], payload("axis")).await.unwrap();
        index.upsert("2", vec![0.9, 0.1, 0.0], payload("close")).await.unwrap();
        index.upsert("3", vec![0.0, 1.0, 0.0], payload("far")).await.unwrap();

        let hit = index.search(vec![1.0, 0.0, 0.0], 0.5).await.unwrap().unwrap();
        assert_eq!(hit.payload.name, "axis");
        assert!((hit.score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_search_below_threshold_is_none() {
        let index = MemoryIndex::new();
        index
            .upsert(
                "1",
                vec![1.0, 0.0],
                FacePayload { name: "a".into(), personnel_id: None },
            )
            .await
            .unwrap();

        let hit = index.search(vec![0.0, 1.0], 0.5).await.unwrap();
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn test_delete_by_name_retains_others() {
        let index = MemoryIndex::new();
        for (id, name) in [("1", "alice"), ("2", "alice"), ("3", "bob")] {
            index
                .upsert(
                    id,
                    vec![1.0, 0.0],
                    FacePayload { name: name.into(), personnel_id: None },
                )
                .await
                .unwrap();
        }

        index.delete_by_name("alice").await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);

        let remaining = index.list(100).await.unwrap();
        assert_eq!(remaining[0].1.name, "bob");
    }
}
