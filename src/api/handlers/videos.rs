use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Json,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::api::error::AppError;
use crate::models::{StorageType, VideoRecord};
use crate::services::streaming::{chunked_body, hls_headers, parse_range_header};

async fn load_record(
    state: &crate::AppState,
    video_id: Uuid,
) -> Result<VideoRecord, AppError> {
    state
        .videos
        .get(video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("video not found: {video_id}")))
}

#[derive(Deserialize, IntoParams)]
pub struct ListVideosQuery {
    /// Organization whose videos to list.
    pub org_id: String,
}

#[utoipa::path(
    get,
    path = "/api/videos",
    params(ListVideosQuery),
    responses(
        (status = 200, description = "Videos for the organization, oldest first", body = [VideoRecord])
    )
)]
pub async fn list_videos(
    State(state): State<crate::AppState>,
    Query(query): Query<ListVideosQuery>,
) -> Result<Json<Vec<VideoRecord>>, AppError> {
    Ok(Json(state.videos.list_by_org(&query.org_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/videos/{video_id}",
    params(
        ("video_id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Video record", body = VideoRecord),
        (status = 404, description = "Video not found")
    )
)]
pub async fn get_video(
    State(state): State<crate::AppState>,
    Path(video_id): Path<Uuid>,
) -> Result<Json<VideoRecord>, AppError> {
    Ok(Json(load_record(&state, video_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/videos/{video_id}/stream",
    params(
        ("video_id" = Uuid, Path, description = "Video ID"),
        ("Range" = Option<String>, Header, description = "HTTP byte range")
    ),
    responses(
        (status = 200, description = "Full video bytes"),
        (status = 206, description = "Partial video bytes"),
        (status = 404, description = "Video or backing object not found")
    )
)]
pub async fn stream_video(
    State(state): State<crate::AppState>,
    Path(video_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let record = load_record(&state, video_id).await?;

    let range_header = headers
        .get(header::RANGE)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned);

    match record.storage_type {
        StorageType::Single => stream_single(&state, &record, range_header).await,
        StorageType::Chunked => stream_chunked(&state, &record, range_header),
    }
}

/// Single-blob case: the client's Range header is forwarded to the backend
/// unmodified and the backend's partial response relayed in bounded chunks.
/// A header we cannot parse gets the full resource instead of a bogus 206,
/// same as the chunked branch.
async fn stream_single(
    state: &crate::AppState,
    record: &VideoRecord,
    range_header: Option<String>,
) -> Result<Response, AppError> {
    let range_header = range_header
        .filter(|h| parse_range_header(h, record.size_bytes as u64).is_some());

    match range_header {
        Some(range) => {
            let object = state
                .blobs
                .get_object_range(&record.storage_path, &range)
                .await?;

            let mut builder = Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, "video/mp4")
                .header(header::ACCEPT_RANGES, "bytes")
                .header(header::CACHE_CONTROL, "no-cache");
            if let Some(content_range) = object.content_range() {
                builder = builder.header(header::CONTENT_RANGE, content_range);
            }
            if let Some(len) = object.content_length() {
                builder = builder.header(header::CONTENT_LENGTH, len.to_string());
            }

            let stream = ReaderStream::new(object.body.into_async_read());
            builder
                .body(Body::from_stream(stream))
                .map_err(|e| AppError::Internal(e.to_string()))
        }
        None => {
            let object = state.blobs.get_object_stream(&record.storage_path).await?;

            let mut builder = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "video/mp4")
                .header(header::ACCEPT_RANGES, "bytes")
                .header(header::CACHE_CONTROL, "no-cache");
            if let Some(len) = object.content_length() {
                builder = builder.header(header::CONTENT_LENGTH, len.to_string());
            }

            let stream = ReaderStream::new(object.body.into_async_read());
            builder
                .body(Body::from_stream(stream))
                .map_err(|e| AppError::Internal(e.to_string()))
        }
    }
}

/// Chunk-canonical case: replay the chunk set in index order, windowed to
/// the requested range. An unsatisfiable range falls back to the full
/// stream.
fn stream_chunked(
    state: &crate::AppState,
    record: &VideoRecord,
    range_header: Option<String>,
) -> Result<Response, AppError> {
    let chunk_count = record.chunk_count.ok_or_else(|| {
        AppError::Internal(format!("chunked video {} has no chunk count", record.id))
    })?;
    let total_size = record.size_bytes as u64;

    let range = range_header
        .as_deref()
        .and_then(|h| parse_range_header(h, total_size));

    let body = chunked_body(state.blobs.clone(), record, chunk_count, range);

    let builder = match range {
        Some((start, end)) => Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_TYPE, "video/mp4")
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::CONTENT_LENGTH, (end - start + 1).to_string())
            .header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, end, total_size),
            ),
        None => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "video/mp4")
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::CONTENT_LENGTH, total_size.to_string()),
    };

    builder
        .body(body)
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[utoipa::path(
    get,
    path = "/api/videos/{video_id}/hls/{filename}",
    params(
        ("video_id" = Uuid, Path, description = "Video ID"),
        ("filename" = String, Path, description = "Manifest or segment file name")
    ),
    responses(
        (status = 200, description = "HLS manifest or segment"),
        (status = 404, description = "Video or file not found"),
        (status = 502, description = "Storage backend error, retryable")
    )
)]
pub async fn serve_hls_file(
    State(state): State<crate::AppState>,
    Path((video_id, filename)): Path<(Uuid, String)>,
) -> Result<Response, AppError> {
    // Segment and playlist names are flat; anything path-like is hostile.
    if filename.contains('/') || filename.contains("..") {
        return Err(AppError::BadRequest("invalid file name".to_string()));
    }

    let record = load_record(&state, video_id).await?;
    let key = format!("{}/{}", record.hls_prefix(), filename);

    let object = state.blobs.get_object_stream(&key).await?;
    let (content_type, cache_control) = hls_headers(&filename);

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, cache_control);
    if let Some(len) = object.content_length() {
        builder = builder.header(header::CONTENT_LENGTH, len.to_string());
    }

    let stream = ReaderStream::new(object.body.into_async_read());
    builder
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::Internal(e.to_string()))
}
