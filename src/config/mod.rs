use std::env;

/// Ingestion and transcoding configuration.
#[derive(Debug, Clone)]
pub struct VideoConfig {
    /// Maximum accepted upload size in bytes (default: 4 GiB)
    pub max_upload_size: i64,

    /// Maximum size of a single chunk body in bytes (default: 32 MiB)
    pub max_chunk_size: usize,

    /// Assembled videos at or below this size are consolidated into a single
    /// blob; larger ones keep their chunk set (default: 50 MiB)
    pub single_blob_threshold: i64,

    /// HLS segment duration in seconds (default: 10)
    pub hls_segment_seconds: u32,

    /// Concurrent transcode pipelines across videos (default: CPU count)
    pub max_concurrent_transcodes: usize,

    /// Per-rendition ffmpeg timeout, as a multiple of source duration,
    /// with a floor for very short inputs (default: 4x, floor 300s)
    pub transcode_timeout_factor: f64,
    pub transcode_timeout_floor_secs: u64,

    /// Upload sessions older than this are swept by the janitor (default: 24)
    pub session_max_age_hours: u64,

    /// Listen port (default: 3000)
    pub port: u16,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 4 * 1024 * 1024 * 1024,
            max_chunk_size: 32 * 1024 * 1024,
            single_blob_threshold: 50 * 1024 * 1024,
            hls_segment_seconds: 10,
            max_concurrent_transcodes: num_cpus::get(),
            transcode_timeout_factor: 4.0,
            transcode_timeout_floor_secs: 300,
            session_max_age_hours: 24,
            port: 3000,
        }
    }
}

impl VideoConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            max_chunk_size: env::var("MAX_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_chunk_size),

            single_blob_threshold: env::var("SINGLE_BLOB_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.single_blob_threshold),

            hls_segment_seconds: env::var("HLS_SEGMENT_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.hls_segment_seconds),

            max_concurrent_transcodes: env::var("MAX_CONCURRENT_TRANSCODES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(default.max_concurrent_transcodes),

            transcode_timeout_factor: env::var("TRANSCODE_TIMEOUT_FACTOR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.transcode_timeout_factor),

            transcode_timeout_floor_secs: env::var("TRANSCODE_TIMEOUT_FLOOR_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.transcode_timeout_floor_secs),

            session_max_age_hours: env::var("SESSION_MAX_AGE_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.session_max_age_hours),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),
        }
    }

    /// Timeout for one rendition's ffmpeg invocation.
    pub fn transcode_timeout(&self, source_duration_seconds: f64) -> std::time::Duration {
        let scaled = (source_duration_seconds * self.transcode_timeout_factor) as u64;
        std::time::Duration::from_secs(scaled.max(self.transcode_timeout_floor_secs))
    }
}
