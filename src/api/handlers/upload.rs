use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::AppError;
use crate::models::VideoStatus;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct InitUploadRequest {
    pub filename: String,
    /// Total upload size in bytes.
    pub size: i64,
    pub total_chunks: u32,
    pub org_id: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct InitUploadResponse {
    pub session_id: Uuid,
    pub video_id: Uuid,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChunkAckResponse {
    pub received: u32,
    /// xxh3 digest of the chunk body, hex-encoded.
    pub checksum: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CompleteUploadResponse {
    pub video_id: Uuid,
    pub status: VideoStatus,
}

#[utoipa::path(
    post,
    path = "/api/videos/upload/init",
    request_body = InitUploadRequest,
    responses(
        (status = 200, description = "Upload session opened", body = InitUploadResponse),
        (status = 400, description = "Malformed init parameters")
    )
)]
pub async fn init_upload(
    State(state): State<crate::AppState>,
    Json(req): Json<InitUploadRequest>,
) -> Result<Json<InitUploadResponse>, AppError> {
    let (session_id, video_id) = state
        .sessions
        .init_session(&req.filename, req.size, req.total_chunks, &req.org_id)
        .await?;

    Ok(Json(InitUploadResponse {
        session_id,
        video_id,
    }))
}

#[utoipa::path(
    put,
    path = "/api/videos/upload/{session_id}/chunk/{index}",
    request_body(content = Vec<u8>, description = "Chunk bytes", content_type = "application/octet-stream"),
    params(
        ("session_id" = Uuid, Path, description = "Upload session ID"),
        ("index" = u32, Path, description = "Zero-based chunk index")
    ),
    responses(
        (status = 200, description = "Chunk stored", body = ChunkAckResponse),
        (status = 400, description = "Chunk index out of range"),
        (status = 404, description = "Session not found")
    )
)]
pub async fn upload_chunk(
    State(state): State<crate::AppState>,
    Path((session_id, index)): Path<(Uuid, u32)>,
    body: axum::body::Bytes,
) -> Result<Json<ChunkAckResponse>, AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("empty chunk body".to_string()));
    }

    let checksum = state
        .sessions
        .put_chunk(session_id, index, body.to_vec())
        .await?;

    Ok(Json(ChunkAckResponse {
        received: index,
        checksum: format!("{:016x}", checksum),
    }))
}

#[utoipa::path(
    post,
    path = "/api/videos/upload/{session_id}/complete",
    params(
        ("session_id" = Uuid, Path, description = "Upload session ID")
    ),
    responses(
        (status = 200, description = "Processing started", body = CompleteUploadResponse),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Upload incomplete, chunks missing")
    )
)]
pub async fn complete_upload(
    State(state): State<crate::AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<CompleteUploadResponse>, AppError> {
    let video_id = state.lifecycle.complete_upload(session_id).await?;

    Ok(Json(CompleteUploadResponse {
        video_id,
        status: VideoStatus::Processing,
    }))
}
