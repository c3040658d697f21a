use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use selfnotes_retrieval::NotesEngine;

use crate::handlers;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<NotesEngine>,
}

impl AppState {
    pub fn new(engine: Arc<NotesEngine>) -> Self {
        Self { engine }
    }
}

/// Build the application router.
///
/// Chat and model routes are served both under `/v1` and at the root, since
/// clients differ in which base URL they expect.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/models", get(handlers::list_models))
        .route("/models", get(handlers::list_models))
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route("/chat/completions", post(handlers::chat_completions))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
