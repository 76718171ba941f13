use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use uuid::Uuid;

use crate::config::VideoConfig;
use crate::services::storage::BlobStore;

pub const MASTER_PLAYLIST_NAME: &str = "master.m3u8";

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("no renditions were produced")]
    AllRenditionsFailed,

    #[error(transparent)]
    Storage(#[from] crate::services::storage::BlobError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One rung of the fixed quality ladder. Maxrate is ~1.07x and buffer ~1.5x
/// the video bitrate.
#[derive(Debug, Clone, Copy)]
pub struct Rendition {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub maxrate_kbps: u32,
    pub bufsize_kbps: u32,
}

impl Rendition {
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Advertised bandwidth: video + audio, in bits per second.
    pub fn bandwidth(&self) -> u64 {
        (self.video_bitrate_kbps as u64 + self.audio_bitrate_kbps as u64) * 1000
    }
}

pub const QUALITY_LADDER: [Rendition; 3] = [
    Rendition {
        name: "1080p",
        width: 1920,
        height: 1080,
        video_bitrate_kbps: 5000,
        audio_bitrate_kbps: 128,
        maxrate_kbps: 5350,
        bufsize_kbps: 7500,
    },
    Rendition {
        name: "720p",
        width: 1280,
        height: 720,
        video_bitrate_kbps: 2500,
        audio_bitrate_kbps: 128,
        maxrate_kbps: 2675,
        bufsize_kbps: 3750,
    },
    Rendition {
        name: "480p",
        width: 854,
        height: 480,
        video_bitrate_kbps: 1000,
        audio_bitrate_kbps: 96,
        maxrate_kbps: 1070,
        bufsize_kbps: 1500,
    },
];

/// A successful ladder rung as listed in the master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestVariant {
    pub name: String,
    pub bandwidth: u64,
    pub resolution: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterManifest {
    pub variants: Vec<ManifestVariant>,
}

impl MasterManifest {
    /// Serialize as the top-level HLS playlist.
    pub fn render(&self) -> String {
        let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
        for variant in &self.variants {
            out.push_str(&format!(
                "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}\n{}.m3u8\n",
                variant.bandwidth, variant.resolution, variant.name
            ));
        }
        out
    }
}

/// Drives the external transcoding tool to produce the quality ladder.
/// Behind a trait so the lifecycle can be exercised with fakes.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(
        &self,
        local_path: &Path,
        video_id: Uuid,
        org_id: &str,
        source_duration_seconds: f64,
    ) -> Result<MasterManifest, TranscodeError>;
}

pub struct FfmpegTranscoder {
    blobs: Arc<dyn BlobStore>,
    config: VideoConfig,
}

impl FfmpegTranscoder {
    pub fn new(blobs: Arc<dyn BlobStore>, config: VideoConfig) -> Self {
        Self { blobs, config }
    }

    /// Run ffmpeg for one rendition. Scales and letterboxes preserving the
    /// source aspect ratio, re-encodes, and segments into fixed-length parts
    /// plus a per-rendition playlist.
    async fn run_rendition(
        &self,
        input: &Path,
        output_dir: &Path,
        rendition: &Rendition,
        source_duration_seconds: f64,
    ) -> Result<(), std::io::Error> {
        let (w, h) = (rendition.width, rendition.height);
        let filter = format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2"
        );
        let segment_pattern = output_dir.join(format!("{}_%03d.ts", rendition.name));
        let playlist = output_dir.join(format!("{}.m3u8", rendition.name));

        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-vf", &filter])
            .args(["-c:v", "h264", "-preset", "fast"])
            .args(["-b:v", &format!("{}k", rendition.video_bitrate_kbps)])
            .args(["-maxrate", &format!("{}k", rendition.maxrate_kbps)])
            .args(["-bufsize", &format!("{}k", rendition.bufsize_kbps)])
            .args(["-c:a", "aac"])
            .args(["-b:a", &format!("{}k", rendition.audio_bitrate_kbps)])
            .args(["-f", "hls"])
            .args(["-hls_time", &self.config.hls_segment_seconds.to_string()])
            .args(["-hls_list_size", "0"])
            .arg("-hls_segment_filename")
            .arg(&segment_pattern)
            .arg(&playlist)
            .kill_on_drop(true);

        let timeout = self.config.transcode_timeout(source_duration_seconds);
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("ffmpeg timed out after {:?}", timeout),
                ));
            }
        };

        if !output.status.success() {
            return Err(std::io::Error::other(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn upload_outputs(
        &self,
        output_dir: &Path,
        video_id: Uuid,
        org_id: &str,
    ) -> Result<(), TranscodeError> {
        let mut entries = tokio::fs::read_dir(output_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().to_string();
            let key = format!("{}/{}/hls/{}", org_id, video_id, file_name);
            let data = tokio::fs::read(entry.path()).await?;
            self.blobs.put_object(&key, data).await?;
            tracing::debug!("Uploaded HLS file {}", key);
        }
        Ok(())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        local_path: &Path,
        video_id: Uuid,
        org_id: &str,
        source_duration_seconds: f64,
    ) -> Result<MasterManifest, TranscodeError> {
        // TempDir scope bounds disk usage: the local output is removed on
        // every exit path, success or not.
        let output_dir = tempfile::tempdir()?;

        let mut variants = Vec::new();
        for rendition in QUALITY_LADDER.iter() {
            tracing::info!("Transcoding {} to {}...", video_id, rendition.name);
            match self
                .run_rendition(
                    local_path,
                    output_dir.path(),
                    rendition,
                    source_duration_seconds,
                )
                .await
            {
                Ok(()) => variants.push(ManifestVariant {
                    name: rendition.name.to_string(),
                    bandwidth: rendition.bandwidth(),
                    resolution: rendition.resolution(),
                }),
                Err(e) => {
                    // One failed rung does not sink the ladder.
                    tracing::error!(
                        "Rendition {} failed for video {}: {}",
                        rendition.name,
                        video_id,
                        e
                    );
                }
            }
        }

        if variants.is_empty() {
            return Err(TranscodeError::AllRenditionsFailed);
        }

        let manifest = MasterManifest { variants };
        tokio::fs::write(
            output_dir.path().join(MASTER_PLAYLIST_NAME),
            manifest.render(),
        )
        .await?;

        self.upload_outputs(output_dir.path(), video_id, org_id)
            .await?;

        Ok(manifest)
    }
}
