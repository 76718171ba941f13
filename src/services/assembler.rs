use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use crate::config::VideoConfig;
use crate::models::StorageType;
use crate::services::session::{UploadError, UploadSession};
use crate::services::storage::BlobStore;

/// Reassembled upload, materialized on local disk for probing and
/// transcoding. The temp dir (and with it the local copy) is removed when
/// this value is dropped at the end of the pipeline.
pub struct AssembledVideo {
    pub local_path: PathBuf,
    pub size_bytes: i64,
    pub storage_type: StorageType,
    pub chunk_count: u32,
    _workdir: tempfile::TempDir,
}

pub struct Assembler {
    blobs: Arc<dyn BlobStore>,
    config: VideoConfig,
}

impl Assembler {
    pub fn new(blobs: Arc<dyn BlobStore>, config: VideoConfig) -> Self {
        Self { blobs, config }
    }

    /// Concatenate the received chunks strictly in index order 0..N-1.
    /// Order is correctness-critical: out-of-order concatenation silently
    /// corrupts the container.
    pub async fn assemble(&self, session: &UploadSession) -> Result<AssembledVideo, UploadError> {
        let workdir = tempfile::tempdir().map_err(anyhow::Error::from)?;
        let local_path = workdir.path().join("original.mp4");

        let mut out = tokio::fs::File::create(&local_path)
            .await
            .map_err(anyhow::Error::from)?;
        let mut size_bytes: i64 = 0;

        for index in 0..session.total_chunks {
            let chunk = self.blobs.get_object(&session.chunk_key(index)).await?;
            size_bytes += chunk.len() as i64;
            out.write_all(&chunk).await.map_err(anyhow::Error::from)?;
        }
        out.flush().await.map_err(anyhow::Error::from)?;

        let storage_type = if size_bytes > self.config.single_blob_threshold {
            // Large upload: the chunk set stays canonical, skipping a
            // redundant re-upload of the whole object.
            tracing::info!(
                "Video {} is {} bytes (> {} threshold), keeping chunked storage",
                session.video_id,
                size_bytes,
                self.config.single_blob_threshold
            );
            StorageType::Chunked
        } else {
            let data = tokio::fs::read(&local_path)
                .await
                .map_err(anyhow::Error::from)?;
            let key = format!("{}/{}/original", session.org_id, session.video_id);
            self.blobs.put_object(&key, data).await?;

            // The consolidated blob is now canonical; chunk deletion is
            // best-effort and non-fatal.
            for index in 0..session.total_chunks {
                let chunk_key = session.chunk_key(index);
                if let Err(e) = self.blobs.delete_object(&chunk_key).await {
                    tracing::warn!("Failed to delete chunk {}: {}", chunk_key, e);
                }
            }
            StorageType::Single
        };

        Ok(AssembledVideo {
            local_path,
            size_bytes,
            storage_type,
            chunk_count: session.total_chunks,
            _workdir: workdir,
        })
    }
}
