pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::VideoConfig;
use crate::services::lifecycle::VideoLifecycle;
use crate::services::session::SessionManager;
use crate::services::storage::BlobStore;
use crate::services::video_store::VideoStore;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::upload::init_upload,
        api::handlers::upload::upload_chunk,
        api::handlers::upload::complete_upload,
        api::handlers::videos::list_videos,
        api::handlers::videos::get_video,
        api::handlers::videos::stream_video,
        api::handlers::videos::serve_hls_file,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::upload::InitUploadRequest,
            api::handlers::upload::InitUploadResponse,
            api::handlers::upload::ChunkAckResponse,
            api::handlers::upload::CompleteUploadResponse,
            models::VideoRecord,
            models::VideoStatus,
            models::StorageType,
        )
    ),
    tags(
        (name = "videos", description = "Video upload, processing and streaming")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub blobs: Arc<dyn BlobStore>,
    pub videos: Arc<dyn VideoStore>,
    pub sessions: Arc<SessionManager>,
    pub lifecycle: Arc<VideoLifecycle>,
    pub config: VideoConfig,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/api/videos/upload/init",
            post(api::handlers::upload::init_upload),
        )
        .route(
            "/api/videos/upload/:session_id/chunk/:index",
            put(api::handlers::upload::upload_chunk).layer(
                axum::extract::DefaultBodyLimit::max(state.config.max_chunk_size),
            ),
        )
        .route(
            "/api/videos/upload/:session_id/complete",
            post(api::handlers::upload::complete_upload),
        )
        .route("/api/videos", get(api::handlers::videos::list_videos))
        .route("/api/videos/:video_id", get(api::handlers::videos::get_video))
        .route(
            "/api/videos/:video_id/stream",
            get(api::handlers::videos::stream_video),
        )
        .route(
            "/api/videos/:video_id/hls/:filename",
            get(api::handlers::videos::serve_hls_file),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
