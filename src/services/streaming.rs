use axum::body::Body;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::models::VideoRecord;
use crate::services::storage::BlobStore;

/// Parse an HTTP `Range` header against a resource of `total_size` bytes.
///
/// Supports `bytes=0-499`, `bytes=500-`, and `bytes=-500` (suffix). Returns
/// an inclusive `(start, end)` pair, or `None` for malformed/unsatisfiable
/// ranges (the caller then serves the full resource).
pub fn parse_range_header(header: &str, total_size: u64) -> Option<(u64, u64)> {
    if total_size == 0 {
        return None;
    }
    let header = header.strip_prefix("bytes=")?;

    let parts: Vec<&str> = header.split('-').collect();
    if parts.len() != 2 {
        return None;
    }

    let start = parts[0].trim();
    let end = parts[1].trim();

    match (start.is_empty(), end.is_empty()) {
        // bytes=-500 (last 500 bytes)
        (true, false) => {
            let suffix_len: u64 = end.parse().ok()?;
            if suffix_len == 0 {
                return None;
            }
            let start = total_size.saturating_sub(suffix_len);
            Some((start, total_size - 1))
        }
        // bytes=500- (from 500 to end)
        (false, true) => {
            let start: u64 = start.parse().ok()?;
            if start >= total_size {
                return None;
            }
            Some((start, total_size - 1))
        }
        // bytes=0-499
        (false, false) => {
            let start: u64 = start.parse().ok()?;
            let end: u64 = end.parse().ok()?;
            if start >= total_size {
                return None;
            }
            let end = end.min(total_size - 1);
            if start > end {
                return None;
            }
            Some((start, end))
        }
        (true, true) => None,
    }
}

/// Media type and cache policy for an HLS file. Manifests can change while
/// renditions complete, so they are never cached; segments are immutable
/// once written.
pub fn hls_headers(filename: &str) -> (&'static str, &'static str) {
    if filename.ends_with(".m3u8") {
        ("application/x-mpegURL", "no-cache")
    } else if filename.ends_with(".ts") {
        ("video/MP2T", "max-age=3600")
    } else {
        ("application/octet-stream", "max-age=3600")
    }
}

/// Relay a chunk-stored video as one ordered byte stream, optionally
/// windowed to an inclusive byte range. The channel capacity of one keeps
/// at most a single chunk buffered; the send blocks until the client
/// drains, which is the backpressure.
pub fn chunked_body(
    blobs: Arc<dyn BlobStore>,
    record: &VideoRecord,
    chunk_count: u32,
    range: Option<(u64, u64)>,
) -> Body {
    let keys: Vec<String> = (0..chunk_count).map(|i| record.chunk_key(i)).collect();
    let video_id = record.id;
    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(1);

    tokio::spawn(async move {
        let (start, end) = range.unwrap_or((0, u64::MAX));
        let mut cursor: u64 = 0;

        for key in keys {
            if cursor > end {
                break;
            }
            let chunk = match blobs.get_object(&key).await {
                Ok(data) => data,
                Err(e) => {
                    tracing::error!("Chunk relay failed for video {}: {}", video_id, e);
                    let _ = tx.send(Err(std::io::Error::other(e.to_string()))).await;
                    return;
                }
            };
            let len = chunk.len() as u64;
            let chunk_start = cursor;
            let chunk_end = cursor + len; // exclusive
            cursor = chunk_end;

            // Intersection of [chunk_start, chunk_end) with [start, end].
            // The inclusive end may be u64::MAX for a full stream.
            let lo = start.max(chunk_start);
            let hi = end.saturating_add(1).min(chunk_end);
            if lo >= hi {
                continue;
            }
            let slice = Bytes::from(chunk)
                .slice((lo - chunk_start) as usize..(hi - chunk_start) as usize);
            if tx.send(Ok(slice)).await.is_err() {
                // Client went away.
                return;
            }
        }
    });

    Body::from_stream(ReceiverStream::new(rx))
}
