use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{MediaInfo, StorageType, VideoRecord, VideoStatus};

/// Keyed `VideoRecord` store. The metadata table itself is an external
/// collaborator; this trait is the narrow seam the service depends on.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn insert(&self, record: VideoRecord) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<VideoRecord>>;
    async fn list_by_org(&self, org_id: &str) -> Result<Vec<VideoRecord>>;

    /// Transition the status. Terminal states are never overwritten.
    async fn set_status(&self, id: Uuid, status: VideoStatus) -> Result<()>;
    /// Record the storage layout after assembly. `size_bytes` is the
    /// assembled byte count, which replaces the client-declared size.
    async fn set_storage(
        &self,
        id: Uuid,
        storage_type: StorageType,
        chunk_count: Option<u32>,
        size_bytes: i64,
    ) -> Result<()>;
    async fn set_media_info(&self, id: Uuid, info: &MediaInfo) -> Result<()>;
    async fn set_manifest(&self, id: Uuid, manifest_path: &str) -> Result<()>;
}

/// Outcome of connecting to the metadata backend. Callers must distinguish
/// "no backend" from "backend returned nothing"; we never hand out a silent
/// no-op store.
pub enum StoreBackend {
    Connected(Arc<dyn VideoStore>),
    Unavailable(String),
}

/// In-process store backing the single-node deployment and all tests.
#[derive(Default)]
pub struct InMemoryVideoStore {
    records: DashMap<Uuid, VideoRecord>,
}

impl InMemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, id: Uuid, f: F) -> Result<()>
    where
        F: FnOnce(&mut VideoRecord),
    {
        let mut entry = self
            .records
            .get_mut(&id)
            .ok_or_else(|| anyhow!("video not found: {}", id))?;
        f(entry.value_mut());
        Ok(())
    }
}

#[async_trait]
impl VideoStore for InMemoryVideoStore {
    async fn insert(&self, record: VideoRecord) -> Result<()> {
        self.records.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<VideoRecord>> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    async fn list_by_org(&self, org_id: &str) -> Result<Vec<VideoRecord>> {
        let mut records: Vec<VideoRecord> = self
            .records
            .iter()
            .filter(|r| r.value().org_id == org_id)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by_key(|r| r.uploaded_at);
        Ok(records)
    }

    async fn set_status(&self, id: Uuid, status: VideoStatus) -> Result<()> {
        self.update(id, |record| {
            if record.status.is_terminal() {
                tracing::warn!(
                    "Ignoring status transition {} -> {} for {}: state is terminal",
                    record.status.as_str(),
                    status.as_str(),
                    id
                );
                return;
            }
            record.status = status;
            if status.is_terminal() {
                record.processed_at = Some(Utc::now());
            }
        })
    }

    async fn set_storage(
        &self,
        id: Uuid,
        storage_type: StorageType,
        chunk_count: Option<u32>,
        size_bytes: i64,
    ) -> Result<()> {
        self.update(id, |record| {
            record.storage_type = storage_type;
            record.chunk_count = chunk_count;
            record.size_bytes = size_bytes;
        })
    }

    async fn set_media_info(&self, id: Uuid, info: &MediaInfo) -> Result<()> {
        self.update(id, |record| {
            record.duration_seconds = info.duration_seconds;
            record.fps = info.fps;
            record.resolution = info.resolution.clone();
            record.codec = info.codec.clone();
            record.bitrate = info.bitrate;
        })
    }

    async fn set_manifest(&self, id: Uuid, manifest_path: &str) -> Result<()> {
        self.update(id, |record| {
            record.hls_manifest_path = Some(manifest_path.to_string());
        })
    }
}
