use std::env;
use std::sync::Arc;
use tracing::info;

use crate::services::video_store::{InMemoryVideoStore, StoreBackend};

/// Connect the metadata store. The outcome is an explicit
/// `Connected | Unavailable` so the caller decides what "no backend" means;
/// nothing here ever substitutes a silent no-op store.
pub async fn setup_video_store() -> StoreBackend {
    let backend = env::var("VIDEO_STORE").unwrap_or_else(|_| "memory".to_string());

    match backend.as_str() {
        // Single-node deployments run on the in-process store. A
        // table-backed implementation plugs in behind the same trait.
        "memory" => {
            info!("Video metadata store: in-memory (single node)");
            StoreBackend::Connected(Arc::new(InMemoryVideoStore::new()))
        }
        other => StoreBackend::Unavailable(format!("unsupported VIDEO_STORE backend: {other}")),
    }
}
