#![allow(dead_code)]

use async_trait::async_trait;
use aws_sdk_s3::operation::get_object::GetObjectOutput;
use aws_sdk_s3::primitives::ByteStream;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use rust_video_backend::config::VideoConfig;
use rust_video_backend::models::{MediaInfo, VideoRecord, VideoStatus};
use rust_video_backend::services::assembler::Assembler;
use rust_video_backend::services::lifecycle::VideoLifecycle;
use rust_video_backend::services::probe::{MediaProbe, ProbeError};
use rust_video_backend::services::session::SessionManager;
use rust_video_backend::services::storage::{BlobError, BlobResult, BlobStore};
use rust_video_backend::services::transcoder::{
    ManifestVariant, MasterManifest, TranscodeError, Transcoder, MASTER_PLAYLIST_NAME,
    QUALITY_LADDER,
};
use rust_video_backend::services::video_store::{InMemoryVideoStore, VideoStore};
use rust_video_backend::{create_app, AppState};

/// In-memory blob store standing in for MinIO.
pub struct MockBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: &str, data: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), data);
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn get_or_not_found(&self, key: &str) -> BlobResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> BlobResult<()> {
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> BlobResult<Vec<u8>> {
        self.get_or_not_found(key)
    }

    async fn get_object_stream(&self, key: &str) -> BlobResult<GetObjectOutput> {
        let data = self.get_or_not_found(key)?;
        Ok(GetObjectOutput::builder()
            .content_length(data.len() as i64)
            .body(ByteStream::from(data))
            .build())
    }

    async fn get_object_range(&self, key: &str, range: &str) -> BlobResult<GetObjectOutput> {
        let data = self.get_or_not_found(key)?;
        let total = data.len() as u64;

        // Same subset of the Range grammar MinIO honors.
        let suffix = range
            .strip_prefix("bytes=")
            .ok_or_else(|| BlobError::backend(anyhow::anyhow!("bad range: {range}")))?;
        let (start_s, end_s) = suffix
            .split_once('-')
            .ok_or_else(|| BlobError::backend(anyhow::anyhow!("bad range: {range}")))?;
        let (start, end) = if start_s.is_empty() {
            let suffix: u64 = end_s
                .parse()
                .map_err(|e| BlobError::backend(anyhow::anyhow!("bad range: {e}")))?;
            (total.saturating_sub(suffix), total - 1)
        } else {
            let start: u64 = start_s
                .parse()
                .map_err(|e| BlobError::backend(anyhow::anyhow!("bad range: {e}")))?;
            let end: u64 = if end_s.is_empty() {
                total - 1
            } else {
                end_s
                    .parse::<u64>()
                    .map_err(|e| BlobError::backend(anyhow::anyhow!("bad range: {e}")))?
                    .min(total - 1)
            };
            (start, end)
        };

        let slice = data[start as usize..=(end as usize)].to_vec();
        Ok(GetObjectOutput::builder()
            .content_length(slice.len() as i64)
            .content_range(format!("bytes {}-{}/{}", start, end, total))
            .body(ByteStream::from(slice))
            .build())
    }

    async fn delete_object(&self, key: &str) -> BlobResult<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn object_exists(&self, key: &str) -> BlobResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }
}

/// Probe that reports fixed metadata without touching ffprobe.
pub struct FakeProbe;

#[async_trait]
impl MediaProbe for FakeProbe {
    async fn probe(&self, _path: &Path) -> Result<MediaInfo, ProbeError> {
        Ok(MediaInfo {
            duration_seconds: 60.0,
            fps: 29.97,
            resolution: "1920x1080".to_string(),
            codec: "h264".to_string(),
            bitrate: 4_000_000,
            size_bytes: 0,
        })
    }
}

/// Probe that always fails, forcing the fallback metadata path.
pub struct BrokenProbe;

#[async_trait]
impl MediaProbe for BrokenProbe {
    async fn probe(&self, _path: &Path) -> Result<MediaInfo, ProbeError> {
        Err(ProbeError::ToolNotFound)
    }
}

/// Transcoder that "succeeds" for the first `successes` ladder rungs and
/// writes a plausible HLS output set into the blob store.
pub struct FakeTranscoder {
    blobs: Arc<MockBlobStore>,
    successes: usize,
}

impl FakeTranscoder {
    pub fn new(blobs: Arc<MockBlobStore>, successes: usize) -> Self {
        Self { blobs, successes }
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(
        &self,
        _local_path: &Path,
        video_id: Uuid,
        org_id: &str,
        _source_duration_seconds: f64,
    ) -> Result<MasterManifest, TranscodeError> {
        let variants: Vec<ManifestVariant> = QUALITY_LADDER
            .iter()
            .take(self.successes)
            .map(|r| ManifestVariant {
                name: r.name.to_string(),
                bandwidth: r.bandwidth(),
                resolution: r.resolution(),
            })
            .collect();

        if variants.is_empty() {
            return Err(TranscodeError::AllRenditionsFailed);
        }

        let prefix = format!("{}/{}/hls", org_id, video_id);
        for variant in &variants {
            self.blobs.put(
                &format!("{}/{}.m3u8", prefix, variant.name),
                format!("#EXTM3U\n#EXTINF:10.0,\n{}_000.ts\n", variant.name).into_bytes(),
            );
            self.blobs.put(
                &format!("{}/{}_000.ts", prefix, variant.name),
                vec![0x47; 188],
            );
        }

        let manifest = MasterManifest { variants };
        self.blobs.put(
            &format!("{}/{}", prefix, MASTER_PLAYLIST_NAME),
            manifest.render().into_bytes(),
        );
        Ok(manifest)
    }
}

/// Store wrapper whose first `set_status` call fails, for exercising the
/// kickoff error path.
pub struct FailOnceStore {
    inner: Arc<InMemoryVideoStore>,
    tripped: std::sync::atomic::AtomicBool,
}

impl FailOnceStore {
    pub fn new(inner: Arc<InMemoryVideoStore>) -> Self {
        Self {
            inner,
            tripped: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl VideoStore for FailOnceStore {
    async fn insert(&self, record: VideoRecord) -> anyhow::Result<()> {
        self.inner.insert(record).await
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<VideoRecord>> {
        self.inner.get(id).await
    }

    async fn list_by_org(&self, org_id: &str) -> anyhow::Result<Vec<VideoRecord>> {
        self.inner.list_by_org(org_id).await
    }

    async fn set_status(&self, id: Uuid, status: VideoStatus) -> anyhow::Result<()> {
        if !self.tripped.swap(true, std::sync::atomic::Ordering::SeqCst) {
            anyhow::bail!("store write refused");
        }
        self.inner.set_status(id, status).await
    }

    async fn set_storage(
        &self,
        id: Uuid,
        storage_type: rust_video_backend::models::StorageType,
        chunk_count: Option<u32>,
        size_bytes: i64,
    ) -> anyhow::Result<()> {
        self.inner
            .set_storage(id, storage_type, chunk_count, size_bytes)
            .await
    }

    async fn set_media_info(&self, id: Uuid, info: &MediaInfo) -> anyhow::Result<()> {
        self.inner.set_media_info(id, info).await
    }

    async fn set_manifest(&self, id: Uuid, manifest_path: &str) -> anyhow::Result<()> {
        self.inner.set_manifest(id, manifest_path).await
    }
}

pub struct TestHarness {
    pub app: axum::Router,
    pub blobs: Arc<MockBlobStore>,
    pub videos: Arc<InMemoryVideoStore>,
    pub state: AppState,
}

/// Wire the service with in-memory fakes. `transcode_successes` controls
/// how many ladder rungs the fake transcoder produces (0 = total failure).
pub fn harness_with(
    config: VideoConfig,
    probe: Arc<dyn MediaProbe>,
    transcode_successes: usize,
) -> TestHarness {
    let blobs = Arc::new(MockBlobStore::new());
    let videos = Arc::new(InMemoryVideoStore::new());

    let sessions = Arc::new(SessionManager::new(
        blobs.clone(),
        videos.clone(),
        config.clone(),
    ));
    let lifecycle = Arc::new(VideoLifecycle::new(
        sessions.clone(),
        Assembler::new(blobs.clone(), config.clone()),
        probe,
        Arc::new(FakeTranscoder::new(blobs.clone(), transcode_successes)),
        videos.clone(),
        config.max_concurrent_transcodes,
    ));

    let state = AppState {
        blobs: blobs.clone(),
        videos: videos.clone(),
        sessions,
        lifecycle,
        config,
    };

    TestHarness {
        app: create_app(state.clone()),
        blobs,
        videos,
        state,
    }
}

pub fn harness() -> TestHarness {
    harness_with(test_config(), Arc::new(FakeProbe), QUALITY_LADDER.len())
}

/// Small threshold so tests exercise both storage layouts without
/// multi-megabyte payloads.
pub fn test_config() -> VideoConfig {
    VideoConfig {
        single_blob_threshold: 1024,
        max_chunk_size: 64 * 1024,
        ..VideoConfig::default()
    }
}

/// Poll until the background pipeline lands the record in a terminal state.
pub async fn wait_for_terminal(videos: &Arc<InMemoryVideoStore>, video_id: Uuid) -> VideoRecord {
    for _ in 0..200 {
        let record = videos
            .get(video_id)
            .await
            .unwrap()
            .expect("video record should exist");
        if record.status.is_terminal() {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("video {} never reached a terminal state", video_id);
}

/// Seed a processed record directly, bypassing the upload pipeline.
pub async fn seed_record(videos: &Arc<InMemoryVideoStore>, record: VideoRecord) {
    videos.insert(record).await.unwrap();
}

pub async fn set_status(videos: &Arc<InMemoryVideoStore>, id: Uuid, status: VideoStatus) {
    videos.set_status(id, status).await.unwrap();
}
