use dotenvy::dotenv;
use rust_video_backend::config::VideoConfig;
use rust_video_backend::infrastructure::{storage, video_store};
use rust_video_backend::services::assembler::Assembler;
use rust_video_backend::services::janitor::SessionJanitor;
use rust_video_backend::services::lifecycle::VideoLifecycle;
use rust_video_backend::services::probe::FfprobeMediaProbe;
use rust_video_backend::services::session::SessionManager;
use rust_video_backend::services::transcoder::FfmpegTranscoder;
use rust_video_backend::services::video_store::StoreBackend;
use rust_video_backend::{create_app, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_video_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting video backend...");

    let config = VideoConfig::from_env();
    info!(
        "Config: threshold={}MB, segment={}s, transcodes={}",
        config.single_blob_threshold / 1024 / 1024,
        config.hls_segment_seconds,
        config.max_concurrent_transcodes
    );

    let blobs = storage::setup_storage().await?;
    let videos = match video_store::setup_video_store().await {
        StoreBackend::Connected(store) => store,
        StoreBackend::Unavailable(reason) => {
            anyhow::bail!("metadata store unavailable: {reason}");
        }
    };

    let sessions = Arc::new(SessionManager::new(
        blobs.clone(),
        videos.clone(),
        config.clone(),
    ));
    let lifecycle = Arc::new(VideoLifecycle::new(
        sessions.clone(),
        Assembler::new(blobs.clone(), config.clone()),
        Arc::new(FfprobeMediaProbe),
        Arc::new(FfmpegTranscoder::new(blobs.clone(), config.clone())),
        videos.clone(),
        config.max_concurrent_transcodes,
    ));

    let state = AppState {
        blobs,
        videos,
        sessions: sessions.clone(),
        lifecycle,
        config: config.clone(),
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let janitor = SessionJanitor::new(sessions, shutdown_rx);
    tokio::spawn(async move {
        janitor.run().await;
    });

    let app = create_app(state).layer(
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server ready at http://{}", addr);
    info!("Swagger UI: http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    info!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("SIGTERM received, starting graceful shutdown...");
        },
    }
}
