use crate::engine::EngineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rollcall_core::AnalyzerError;
use rollcall_store::StoreError;
use serde_json::json;

/// Error taxonomy of the HTTP surface: input problems map to 400,
/// unknown names to 404, backend (store or inference) failures to 500.
/// Every error renders as a JSON body `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Backend(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Backend(e.to_string())
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match &e {
            EngineError::Analyzer(AnalyzerError::NoFaceDetected) => {
                ApiError::BadRequest("No faces detected in the image".to_string())
            }
            _ => ApiError::Backend(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(%message, "request failed");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
