//! API errors rendered as OpenAI-style error bodies.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use selfnotes_retrieval::{AskError, RetrieveError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// The index is missing, empty or unreadable.
    #[error("{0}")]
    StoreUnavailable(String),

    /// An embedding or generation backend failed.
    #[error("{0}")]
    Backend(String),
}

impl From<AskError> for ApiError {
    fn from(err: AskError) -> Self {
        let message = err.to_string();
        match err {
            AskError::EmptyQuestion => ApiError::BadRequest(message),
            AskError::Retrieve(RetrieveError::StoreUnavailable(_)) => {
                ApiError::StoreUnavailable(message)
            }
            AskError::Retrieve(RetrieveError::EmbedFailed(_)) | AskError::Compose(_) => {
                ApiError::Backend(message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error"),
            ApiError::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "index_unavailable"),
            ApiError::Backend(_) => (StatusCode::BAD_GATEWAY, "backend_error"),
        };
        warn!("Request failed with {status}: {self}");

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": kind,
                "code": status.as_u16(),
            }
        }));
        (status, body).into_response()
    }
}
