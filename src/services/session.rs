use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_64;

use crate::config::VideoConfig;
use crate::models::VideoRecord;
use crate::services::storage::BlobStore;
use crate::services::video_store::VideoStore;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("invalid upload request: {0}")]
    InvalidRequest(String),

    #[error("upload session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("chunk index {index} out of range (total chunks: {total})")]
    ChunkOutOfRange { index: u32, total: u32 },

    #[error("upload incomplete: {0} chunk(s) missing")]
    MissingChunks(u32),

    #[error(transparent)]
    Storage(#[from] crate::services::storage::BlobError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// In-progress chunked upload. Owned exclusively by [`SessionManager`] and
/// removed from the map once assembly starts.
pub struct UploadSession {
    pub video_id: Uuid,
    pub org_id: String,
    pub filename: String,
    pub total_size_bytes: i64,
    pub total_chunks: u32,
    /// The only per-session shared mutable state; guarded so concurrent
    /// retried uploads never double-count an index.
    pub received: Mutex<HashSet<u32>>,
    pub created_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn chunk_key(&self, index: u32) -> String {
        format!("{}/{}/chunks/{:05}", self.org_id, self.video_id, index)
    }
}

pub struct SessionManager {
    sessions: DashMap<Uuid, Arc<UploadSession>>,
    blobs: Arc<dyn BlobStore>,
    videos: Arc<dyn VideoStore>,
    config: VideoConfig,
}

impl SessionManager {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        videos: Arc<dyn VideoStore>,
        config: VideoConfig,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            blobs,
            videos,
            config,
        }
    }

    /// Open an upload session and create the backing `VideoRecord`
    /// (status `uploaded`). Rejected synchronously on malformed parameters;
    /// no state is created in that case.
    pub async fn init_session(
        &self,
        filename: &str,
        total_size_bytes: i64,
        total_chunks: u32,
        org_id: &str,
    ) -> Result<(Uuid, Uuid), UploadError> {
        if total_size_bytes <= 0 {
            return Err(UploadError::InvalidRequest(
                "size must be positive".to_string(),
            ));
        }
        if total_chunks == 0 {
            return Err(UploadError::InvalidRequest(
                "total_chunks must be positive".to_string(),
            ));
        }
        if total_size_bytes > self.config.max_upload_size {
            return Err(UploadError::InvalidRequest(format!(
                "upload too large: {} bytes (max {})",
                total_size_bytes, self.config.max_upload_size
            )));
        }
        if filename.is_empty() {
            return Err(UploadError::InvalidRequest(
                "filename must not be empty".to_string(),
            ));
        }

        let record = VideoRecord::new(org_id, filename, total_size_bytes);
        let video_id = record.id;
        self.videos.insert(record).await?;

        let session_id = Uuid::new_v4();
        let session = UploadSession {
            video_id,
            org_id: org_id.to_string(),
            filename: filename.to_string(),
            total_size_bytes,
            total_chunks,
            received: Mutex::new(HashSet::new()),
            created_at: Utc::now(),
        };
        self.sessions.insert(session_id, Arc::new(session));

        tracing::info!(
            "Upload session {} opened for video {} ({}, {} bytes, {} chunks)",
            session_id,
            video_id,
            filename,
            total_size_bytes,
            total_chunks
        );

        Ok((session_id, video_id))
    }

    /// Store one chunk. Idempotent per index: a re-upload overwrites the
    /// blob and is counted at most once. The index is marked received only
    /// after the blob write succeeds, so a crash mid-write never falsely
    /// reports completion. Returns an xxh3 digest of the chunk as the ack.
    pub async fn put_chunk(
        &self,
        session_id: Uuid,
        index: u32,
        data: Vec<u8>,
    ) -> Result<u64, UploadError> {
        let session = self.get_session(session_id)?;

        if index >= session.total_chunks {
            return Err(UploadError::ChunkOutOfRange {
                index,
                total: session.total_chunks,
            });
        }

        let checksum = xxh3_64(&data);
        self.blobs.put_object(&session.chunk_key(index), data).await?;

        let mut received = session.received.lock().await;
        received.insert(index);

        Ok(checksum)
    }

    pub async fn is_complete(&self, session_id: Uuid) -> Result<bool, UploadError> {
        Ok(self.missing_count(session_id).await? == 0)
    }

    pub async fn missing_count(&self, session_id: Uuid) -> Result<u32, UploadError> {
        let session = self.get_session(session_id)?;
        let received = session.received.lock().await;
        Ok(session.total_chunks - received.len() as u32)
    }

    /// Check the session is complete without consuming it, so callers can
    /// do fallible work (like a status write) while a retry of `complete`
    /// is still possible. Fails `MissingChunks` when incomplete.
    pub async fn ready_session(
        &self,
        session_id: Uuid,
    ) -> Result<Arc<UploadSession>, UploadError> {
        let missing = self.missing_count(session_id).await?;
        if missing > 0 {
            return Err(UploadError::MissingChunks(missing));
        }
        self.get_session(session_id)
    }

    /// Hand the session over to assembly, discarding it from the map.
    /// Fails `MissingChunks` (and keeps the session) when incomplete.
    pub async fn take_complete(
        &self,
        session_id: Uuid,
    ) -> Result<Arc<UploadSession>, UploadError> {
        self.ready_session(session_id).await?;
        let (_, session) = self
            .sessions
            .remove(&session_id)
            .ok_or(UploadError::SessionNotFound(session_id))?;
        Ok(session)
    }

    fn get_session(&self, session_id: Uuid) -> Result<Arc<UploadSession>, UploadError> {
        self.sessions
            .get(&session_id)
            .map(|s| s.value().clone())
            .ok_or(UploadError::SessionNotFound(session_id))
    }

    /// Drop sessions older than the configured age and best-effort delete
    /// their chunk blobs. Called by the janitor; deletion failures are
    /// logged, never propagated.
    pub async fn sweep_expired(&self) -> usize {
        let cutoff = Utc::now() - Duration::hours(self.config.session_max_age_hours as i64);
        let expired: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().created_at < cutoff)
            .map(|entry| *entry.key())
            .collect();

        for session_id in &expired {
            if let Some((_, session)) = self.sessions.remove(session_id) {
                tracing::info!(
                    "Expiring upload session {} (video {})",
                    session_id,
                    session.video_id
                );
                let received = session.received.lock().await;
                for index in received.iter() {
                    let key = session.chunk_key(*index);
                    if let Err(e) = self.blobs.delete_object(&key).await {
                        tracing::warn!("Failed to delete expired chunk {}: {}", key, e);
                    }
                }
            }
        }
        expired.len()
    }
}
