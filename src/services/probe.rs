use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

use crate::models::MediaInfo;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("ffprobe not found on PATH")]
    ToolNotFound,

    #[error("ffprobe exited with {status}: {stderr}")]
    ToolFailed { status: i32, stderr: String },

    #[error("failed to parse ffprobe output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Extracts duration/fps/resolution/codec/bitrate from a local file.
/// Narrow seam over the external inspection tool so the orchestrator can be
/// tested with a fake.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError>;
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

/// Frame rate arrives as a rational "num/den". Malformed input or a zero
/// denominator yields 0 so nothing downstream ever divides by it.
fn parse_frame_rate(raw: &str) -> f64 {
    let mut parts = raw.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(num), Some(den), None) => {
            let num: f64 = match num.trim().parse() {
                Ok(v) => v,
                Err(_) => return 0.0,
            };
            let den: f64 = match den.trim().parse() {
                Ok(v) => v,
                Err(_) => return 0.0,
            };
            if den == 0.0 {
                0.0
            } else {
                num / den
            }
        }
        _ => 0.0,
    }
}

pub struct FfprobeMediaProbe;

#[async_trait]
impl MediaProbe for FfprobeMediaProbe {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProbeError::ToolNotFound
                } else {
                    ProbeError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(ProbeError::ToolFailed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;

        let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");

        let fps = video_stream
            .and_then(|s| s.r_frame_rate.as_deref())
            .map(parse_frame_rate)
            .unwrap_or(0.0);

        let resolution = match video_stream {
            Some(s) => format!(
                "{}x{}",
                s.width.unwrap_or(0),
                s.height.unwrap_or(0)
            ),
            None => "0x0".to_string(),
        };

        Ok(MediaInfo {
            duration_seconds: probe
                .format
                .duration
                .as_deref()
                .and_then(|d| d.parse().ok())
                .unwrap_or(0.0),
            fps,
            resolution,
            codec: video_stream
                .and_then(|s| s.codec_name.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            bitrate: probe
                .format
                .bit_rate
                .as_deref()
                .and_then(|b| b.parse().ok())
                .unwrap_or(0),
            size_bytes: probe
                .format
                .size
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        })
    }
}
