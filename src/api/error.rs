use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::session::UploadError;
use crate::services::storage::BlobError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream storage error: {0}")]
    BadGateway(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::InvalidRequest(msg) => AppError::BadRequest(msg),
            UploadError::SessionNotFound(_) => AppError::NotFound(err.to_string()),
            UploadError::ChunkOutOfRange { .. } => AppError::BadRequest(err.to_string()),
            UploadError::MissingChunks(_) => AppError::Conflict(err.to_string()),
            UploadError::Storage(e) => e.into(),
            UploadError::Other(e) => AppError::Anyhow(e),
        }
    }
}

impl From<BlobError> for AppError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound(key) => AppError::NotFound(format!("object not found: {key}")),
            // Backend failures are retryable from the client's point of view.
            BlobError::Backend(e) => AppError::BadGateway(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::BadGateway(msg) => {
                tracing::error!("Storage backend error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Upstream storage error, retry later".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Anyhow(e) => {
                tracing::error!("Unhandled error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
