use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle state of an ingested video. `Processed` and `Failed` are
/// terminal; nothing transitions a video out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Uploaded,
    Processing,
    Processed,
    Failed,
}

impl VideoStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Processed | VideoStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Uploaded => "uploaded",
            VideoStatus::Processing => "processing",
            VideoStatus::Processed => "processed",
            VideoStatus::Failed => "failed",
        }
    }
}

/// How the original bytes are persisted in the blob store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// One consolidated object at `storage_path`.
    Single,
    /// The upload chunks remain the canonical representation.
    Chunked,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VideoRecord {
    pub id: Uuid,
    pub org_id: String,
    pub filename: String,
    /// Object key of the consolidated original: `{org}/{video_id}/original`.
    pub storage_path: String,
    pub storage_type: StorageType,
    /// Number of chunk objects; only meaningful for `StorageType::Chunked`.
    pub chunk_count: Option<u32>,
    pub size_bytes: i64,
    pub status: VideoStatus,
    pub duration_seconds: f64,
    pub fps: f64,
    pub resolution: String,
    pub codec: String,
    pub bitrate: i64,
    pub hls_manifest_path: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl VideoRecord {
    pub fn new(org_id: &str, filename: &str, size_bytes: i64) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            org_id: org_id.to_string(),
            filename: filename.to_string(),
            storage_path: format!("{}/{}/original", org_id, id),
            storage_type: StorageType::Single,
            chunk_count: None,
            size_bytes,
            status: VideoStatus::Uploaded,
            duration_seconds: 0.0,
            fps: 0.0,
            resolution: String::new(),
            codec: String::new(),
            bitrate: 0,
            hls_manifest_path: None,
            uploaded_at: Utc::now(),
            processed_at: None,
        }
    }

    /// Object key prefix holding this video's HLS output.
    pub fn hls_prefix(&self) -> String {
        format!("{}/{}/hls", self.org_id, self.id)
    }

    /// Object key of one upload chunk. Zero-padded so lexicographic listing
    /// matches index order.
    pub fn chunk_key(&self, index: u32) -> String {
        format!("{}/{}/chunks/{:05}", self.org_id, self.id, index)
    }
}

/// Media attributes extracted by the probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration_seconds: f64,
    pub fps: f64,
    pub resolution: String,
    pub codec: String,
    pub bitrate: i64,
    pub size_bytes: i64,
}

impl MediaInfo {
    /// Substitute used when ffprobe fails; metadata degradation must never
    /// block ingestion.
    pub fn fallback(size_bytes: i64) -> Self {
        Self {
            duration_seconds: 0.0,
            fps: 30.0,
            resolution: "unknown".to_string(),
            codec: "unknown".to_string(),
            bitrate: 0,
            size_bytes,
        }
    }
}
