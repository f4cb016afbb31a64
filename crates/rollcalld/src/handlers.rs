//! Request handlers for the face recognition API.
//!
//! Each handler validates the presence of its required fields, converts the
//! base64 image, requests an embedding from the engine, and forwards to the
//! face database. There is no transaction across those steps.

use crate::error::ApiError;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use base64::Engine as _;
use image::RgbImage;
use rollcall_store::DEFAULT_SIMILARITY_THRESHOLD;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct AddFaceRequest {
    name: Option<String>,
    #[serde(rename = "personnelId")]
    personnel_id: Option<String>,
    image: Option<String>,
}

#[derive(Serialize)]
pub struct AddFaceResponse {
    success: bool,
    message: String,
    name: String,
    #[serde(rename = "personnelId")]
    personnel_id: String,
    faces_detected: usize,
}

#[derive(Deserialize)]
pub struct SearchFaceRequest {
    image: Option<String>,
    threshold: Option<f32>,
}

#[derive(Serialize)]
pub struct SearchFaceResponse {
    success: bool,
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "personnelId", skip_serializing_if = "Option::is_none")]
    personnel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    threshold: f32,
}

#[derive(Serialize)]
pub struct FaceEntry {
    id: String,
    name: String,
    #[serde(rename = "personnelId", skip_serializing_if = "Option::is_none")]
    personnel_id: Option<String>,
}

#[derive(Serialize)]
pub struct ListFacesResponse {
    success: bool,
    faces: Vec<FaceEntry>,
    count: usize,
}

#[derive(Deserialize)]
pub struct DeleteFaceRequest {
    name: Option<String>,
}

#[derive(Serialize)]
pub struct DeleteFaceResponse {
    success: bool,
    message: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    qdrant_connected: bool,
    model_loaded: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        qdrant_connected: state.facedb.is_connected().await,
        // The engine loads both models before the server starts serving.
        model_loaded: true,
    })
}

pub async fn add_face(
    State(state): State<AppState>,
    Json(req): Json<AddFaceRequest>,
) -> Result<Json<AddFaceResponse>, ApiError> {
    let name = require(req.name, "Name is required")?;
    let personnel_id = require(req.personnel_id, "personnelId is required")?;
    let image_data = require(req.image, "Image data is required")?;

    let image = decode_base64_image(&image_data)?;
    let outcome = state.engine.embed(image).await?;

    state
        .facedb
        .add(&name, &outcome.embedding, Some(personnel_id.clone()))
        .await?;

    Ok(Json(AddFaceResponse {
        success: true,
        message: format!("Face added successfully for {name}"),
        name,
        personnel_id,
        faces_detected: outcome.faces_detected,
    }))
}

pub async fn search_face(
    State(state): State<AppState>,
    Json(req): Json<SearchFaceRequest>,
) -> Result<Json<SearchFaceResponse>, ApiError> {
    let image_data = require(req.image, "Image data is required")?;
    let threshold = req.threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);

    let image = decode_base64_image(&image_data)?;
    let outcome = state.engine.embed(image).await?;

    let found = state.facedb.search(&outcome.embedding, threshold).await?;

    let response = match found {
        Some(m) => SearchFaceResponse {
            success: true,
            found: true,
            name: Some(m.name),
            personnel_id: m.personnel_id,
            score: Some(m.score),
            message: None,
            threshold,
        },
        None => SearchFaceResponse {
            success: true,
            found: false,
            name: None,
            personnel_id: None,
            score: None,
            message: Some("No matching face found".to_string()),
            threshold,
        },
    };

    Ok(Json(response))
}

pub async fn list_faces(
    State(state): State<AppState>,
) -> Result<Json<ListFacesResponse>, ApiError> {
    let records = state.facedb.list_faces().await?;

    let faces: Vec<FaceEntry> = records
        .into_iter()
        .map(|r| FaceEntry {
            id: r.id,
            name: r.name,
            personnel_id: r.personnel_id,
        })
        .collect();

    let count = faces.len();
    Ok(Json(ListFacesResponse {
        success: true,
        faces,
        count,
    }))
}

pub async fn delete_face(
    State(state): State<AppState>,
    Json(req): Json<DeleteFaceRequest>,
) -> Result<Json<DeleteFaceResponse>, ApiError> {
    let name = require(req.name, "Name is required")?;

    if state.facedb.delete(&name).await? {
        Ok(Json(DeleteFaceResponse {
            success: true,
            message: format!("Face deleted successfully for {name}"),
        }))
    } else {
        Err(ApiError::NotFound(format!("Face not found for {name}")))
    }
}

/// Reject absent or empty required fields with the given message.
fn require(field: Option<String>, message: &str) -> Result<String, ApiError> {
    field
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(message.to_string()))
}

/// Decode a base64 image (with or without a `data:...;base64,` prefix) into
/// an RGB image.
fn decode_base64_image(data: &str) -> Result<RgbImage, ApiError> {
    let b64 = match data.split_once(',') {
        Some((_, rest)) => rest,
        None => data,
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|e| ApiError::BadRequest(format!("Invalid image data: {e}")))?;

    let image = image::load_from_memory(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("Invalid image data: {e}")))?;

    Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::stub;
    use crate::routes::{router, AppState};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use rollcall_store::{FaceDb, FacePayload, MemoryIndex, ScoredHit, StoreError, VectorIndex};
    use serde_json::{json, Value};
    use std::io::Cursor;
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Index whose every operation fails as if the service were down.
    struct DisconnectedIndex;

    #[async_trait]
    impl VectorIndex for DisconnectedIndex {
        async fn ensure_ready(&self) -> Result<(), StoreError> {
            Err(down())
        }
        async fn upsert(
            &self,
            _id: &str,
            _vector: Vec<f32>,
            _payload: FacePayload,
        ) -> Result<(), StoreError> {
            Err(down())
        }
        async fn search(
            &self,
            _vector: Vec<f32>,
            _threshold: f32,
        ) -> Result<Option<ScoredHit>, StoreError> {
            Err(down())
        }
        async fn list(&self, _limit: usize) -> Result<Vec<(String, FacePayload)>, StoreError> {
            Err(down())
        }
        async fn delete_by_name(&self, _name: &str) -> Result<(), StoreError> {
            Err(down())
        }
        async fn count(&self) -> Result<u64, StoreError> {
            Err(down())
        }
    }

    fn down() -> StoreError {
        StoreError::Connection("connection refused".to_string())
    }

    fn app_with(index: Arc<dyn VectorIndex>) -> Router {
        router(AppState {
            engine: stub::fixed_embedding_engine(),
            facedb: FaceDb::new(index),
        })
    }

    /// Tiny valid PNG, base64-encoded.
    fn png_base64() -> String {
        let img = image::DynamicImage::new_rgb8(32, 32);
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    }

    async fn send_json(
        app: Router,
        method: &str,
        uri: &str,
        body: Value,
    ) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn send_get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_add_face_missing_name_is_400() {
        let app = app_with(Arc::new(MemoryIndex::new()));
        let (status, body) = send_json(
            app,
            "POST",
            "/add_face",
            json!({ "personnelId": "emp-1", "image": png_base64() }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Name is required");
    }

    #[tokio::test]
    async fn test_add_face_missing_image_is_400() {
        let app = app_with(Arc::new(MemoryIndex::new()));
        let (status, body) = send_json(
            app,
            "POST",
            "/add_face",
            json!({ "name": "alice", "personnelId": "emp-1" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Image data is required");
    }

    #[tokio::test]
    async fn test_add_face_invalid_base64_is_400() {
        let app = app_with(Arc::new(MemoryIndex::new()));
        let (status, body) = send_json(
            app,
            "POST",
            "/add_face",
            json!({ "name": "alice", "personnelId": "emp-1", "image": "!!not-base64!!" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid image data"));
    }

    #[tokio::test]
    async fn test_add_face_backend_disconnected_is_500() {
        let app = app_with(Arc::new(DisconnectedIndex));
        let (status, body) = send_json(
            app,
            "POST",
            "/add_face",
            json!({ "name": "alice", "personnelId": "emp-1", "image": png_base64() }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("unreachable"));
    }

    #[tokio::test]
    async fn test_add_face_no_face_detected_is_400() {
        let app = router(AppState {
            engine: stub::no_face_engine(),
            facedb: FaceDb::new(Arc::new(MemoryIndex::new())),
        });
        let (status, body) = send_json(
            app,
            "POST",
            "/add_face",
            json!({ "name": "alice", "personnelId": "emp-1", "image": png_base64() }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No faces detected in the image");
    }

    #[tokio::test]
    async fn test_add_then_search_finds_match() {
        let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new());

        let (status, body) = send_json(
            app_with(index.clone()),
            "POST",
            "/add_face",
            json!({ "name": "alice", "personnelId": "emp-17", "image": png_base64() }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["faces_detected"], 1);

        // The stub engine embeds every image identically, so the search
        // probe matches the stored vector exactly.
        let (status, body) = send_json(
            app_with(index),
            "POST",
            "/search_face",
            json!({ "image": png_base64() }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["found"], true);
        assert_eq!(body["name"], "alice");
        assert_eq!(body["personnelId"], "emp-17");
        assert!(body["score"].as_f64().unwrap() > 0.999);
        assert!((body["threshold"].as_f64().unwrap() - 0.55).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_search_face_missing_image_is_400() {
        let app = app_with(Arc::new(MemoryIndex::new()));
        let (status, body) = send_json(app, "POST", "/search_face", json!({})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Image data is required");
    }

    #[tokio::test]
    async fn test_search_face_empty_db_reports_not_found() {
        let app = app_with(Arc::new(MemoryIndex::new()));
        let (status, body) = send_json(
            app,
            "POST",
            "/search_face",
            json!({ "image": png_base64(), "threshold": 0.7 }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["found"], false);
        assert_eq!(body["message"], "No matching face found");
        assert!((body["threshold"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_list_faces_counts_records() {
        let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new());

        for (name, pid) in [("alice", "emp-1"), ("bob", "emp-2")] {
            let (status, _) = send_json(
                app_with(index.clone()),
                "POST",
                "/add_face",
                json!({ "name": name, "personnelId": pid, "image": png_base64() }),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = send_get(app_with(index), "/list_faces").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["faces"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_face_unknown_name_is_404() {
        let app = app_with(Arc::new(MemoryIndex::new()));
        let (status, body) =
            send_json(app, "DELETE", "/delete_face", json!({ "name": "nobody" })).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Face not found for nobody");
    }

    #[tokio::test]
    async fn test_delete_face_removes_person() {
        let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new());

        let (status, _) = send_json(
            app_with(index.clone()),
            "POST",
            "/add_face",
            json!({ "name": "alice", "personnelId": "emp-1", "image": png_base64() }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send_json(
            app_with(index.clone()),
            "DELETE",
            "/delete_face",
            json!({ "name": "alice" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (_, body) = send_get(app_with(index), "/list_faces").await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_health_reports_connectivity() {
        let (status, body) = send_get(app_with(Arc::new(MemoryIndex::new())), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["qdrant_connected"], true);
        assert_eq!(body["model_loaded"], true);

        let (status, body) = send_get(app_with(Arc::new(DisconnectedIndex)), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["qdrant_connected"], false);
    }
}
