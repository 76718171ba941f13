use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use uuid::Uuid;

use crate::models::{MediaInfo, VideoStatus};
use crate::services::assembler::Assembler;
use crate::services::probe::MediaProbe;
use crate::services::session::{SessionManager, UploadError, UploadSession};
use crate::services::transcoder::{Transcoder, MASTER_PLAYLIST_NAME};
use crate::services::video_store::VideoStore;

/// Orchestrates assemble -> probe -> transcode for one video and owns every
/// `VideoRecord` mutation past session init. Distinct videos run
/// concurrently, bounded by the transcode semaphore; one video runs its
/// pipeline strictly sequentially and at most once at a time.
pub struct VideoLifecycle {
    sessions: Arc<SessionManager>,
    assembler: Assembler,
    probe: Arc<dyn MediaProbe>,
    transcoder: Arc<dyn Transcoder>,
    videos: Arc<dyn VideoStore>,
    transcode_slots: Arc<Semaphore>,
    // Per-video guard; locks are few and short-lived, entries are removed
    // once the pipeline finishes.
    running: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl VideoLifecycle {
    pub fn new(
        sessions: Arc<SessionManager>,
        assembler: Assembler,
        probe: Arc<dyn MediaProbe>,
        transcoder: Arc<dyn Transcoder>,
        videos: Arc<dyn VideoStore>,
        max_concurrent_transcodes: usize,
    ) -> Self {
        Self {
            sessions,
            assembler,
            probe,
            transcoder,
            videos,
            transcode_slots: Arc::new(Semaphore::new(max_concurrent_transcodes)),
            running: DashMap::new(),
        }
    }

    /// Handle the single "upload complete" event for a session: validate
    /// completeness, flip the record to `processing`, and run the pipeline
    /// in the background. Returns the video id once processing is underway.
    pub async fn complete_upload(self: &Arc<Self>, session_id: Uuid) -> Result<Uuid, UploadError> {
        // Flip the status while the session is still held: if the write
        // fails, the session survives and `complete` can be retried.
        let video_id = self.sessions.ready_session(session_id).await?.video_id;
        self.videos
            .set_status(video_id, VideoStatus::Processing)
            .await?;

        let session = self.sessions.take_complete(session_id).await?;

        let lifecycle = self.clone();
        tokio::spawn(async move {
            lifecycle.run_guarded(session).await;
        });

        Ok(video_id)
    }

    /// Run the pipeline and enforce the failure-path guarantee: whatever
    /// goes wrong inside (including a panic), the record must end up
    /// `processed` or `failed`, never stuck at `processing`.
    async fn run_guarded(self: Arc<Self>, session: Arc<UploadSession>) {
        let video_id = session.video_id;

        let guard = self
            .running
            .entry(video_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let _lock = guard.lock().await;

        let inner = self.clone();
        let task = tokio::spawn(async move { inner.run_pipeline(&session).await });

        let outcome = match task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(join_err) => Err(format!("pipeline task aborted: {join_err}")),
        };

        if let Err(reason) = outcome {
            tracing::error!("Processing failed for video {}: {}", video_id, reason);
            if let Err(e) = self.videos.set_status(video_id, VideoStatus::Failed).await {
                tracing::error!("Failed to mark video {} as failed: {}", video_id, e);
            }
        }

        self.running.remove(&video_id);
    }

    async fn run_pipeline(&self, session: &UploadSession) -> anyhow::Result<()> {
        let video_id = session.video_id;

        let assembled = self.assembler.assemble(session).await?;
        self.videos
            .set_storage(
                video_id,
                assembled.storage_type,
                Some(assembled.chunk_count),
                assembled.size_bytes,
            )
            .await?;

        let info = match self.probe.probe(&assembled.local_path).await {
            Ok(info) => info,
            Err(e) => {
                // Probe failure degrades metadata, never blocks ingestion.
                tracing::warn!(
                    "Probe failed for video {}, using fallback metadata: {}",
                    video_id,
                    e
                );
                MediaInfo::fallback(assembled.size_bytes)
            }
        };
        self.videos.set_media_info(video_id, &info).await?;

        // Transcoding dominates resource cost; gate it on the worker pool.
        let _permit = self.transcode_slots.acquire().await?;
        let manifest = self
            .transcoder
            .transcode(
                &assembled.local_path,
                video_id,
                &session.org_id,
                info.duration_seconds,
            )
            .await?;

        let manifest_path = format!(
            "{}/{}/hls/{}",
            session.org_id, video_id, MASTER_PLAYLIST_NAME
        );
        self.videos.set_manifest(video_id, &manifest_path).await?;
        self.videos
            .set_status(video_id, VideoStatus::Processed)
            .await?;

        tracing::info!(
            "Video {} processed: {} rendition(s), manifest {}",
            video_id,
            manifest.variants.len(),
            manifest_path
        );
        Ok(())
    }
}
