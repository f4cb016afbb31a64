use crate::engine::EngineHandle;
use crate::handlers;
use axum::routing::{delete, get, post};
use axum::Router;
use rollcall_store::FaceDb;
use tower_http::trace::TraceLayer;

/// Shared state for all request handlers: the inference engine handle and
/// the face database. Both are cheap clones around channels/Arcs.
#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub facedb: FaceDb,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/add_face", post(handlers::add_face))
        .route("/search_face", post(handlers::search_face))
        .route("/list_faces", get(handlers::list_faces))
        .route("/delete_face", delete(handlers::delete_face))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
