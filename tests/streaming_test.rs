mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use common::{harness, seed_record, set_status};
use rust_video_backend::models::{StorageType, VideoRecord, VideoStatus};

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn get(app: &axum::Router, uri: String, range: Option<&str>) -> axum::response::Response {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(range) = range {
        builder = builder.header(header::RANGE, range);
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// A processed single-blob video with `size` pattern bytes in the store.
async fn seed_single(h: &common::TestHarness, size: usize) -> (Uuid, Vec<u8>) {
    let mut record = VideoRecord::new("org-test", "clip.mp4", size as i64);
    let id = record.id;
    record.status = VideoStatus::Processed;

    let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    h.blobs.put(&record.storage_path, data.clone());
    seed_record(&h.videos, record).await;
    (id, data)
}

/// A processed chunk-stored video; chunk objects hold `chunks` in order.
async fn seed_chunked(h: &common::TestHarness, chunks: &[Vec<u8>]) -> (Uuid, Vec<u8>) {
    let total: usize = chunks.iter().map(Vec::len).sum();
    let mut record = VideoRecord::new("org-test", "big.mp4", total as i64);
    let id = record.id;
    record.status = VideoStatus::Processed;
    record.storage_type = StorageType::Chunked;
    record.chunk_count = Some(chunks.len() as u32);

    let mut flat = Vec::with_capacity(total);
    for (i, chunk) in chunks.iter().enumerate() {
        h.blobs.put(&record.chunk_key(i as u32), chunk.clone());
        flat.extend_from_slice(chunk);
    }
    seed_record(&h.videos, record).await;
    (id, flat)
}

#[tokio::test]
async fn test_get_video_returns_record() {
    let h = harness();
    let (id, _) = seed_single(&h, 100).await;

    let response = get(&h.app, format!("/api/videos/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["status"], "processed");
    assert_eq!(body["filename"], "clip.mp4");

    let response = get(&h.app, format!("/api/videos/{}", Uuid::new_v4()), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_videos_by_org() {
    let h = harness();
    let (id_a, _) = seed_single(&h, 100).await;
    let mut other = VideoRecord::new("org-other", "x.mp4", 50);
    other.status = VideoStatus::Processed;
    seed_record(&h.videos, other).await;

    let response = get(&h.app, "/api/videos?org_id=org-test".to_string(), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], id_a.to_string());

    let response = get(&h.app, "/api/videos?org_id=org-empty".to_string(), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_stream_single_full() {
    let h = harness();
    let (id, data) = seed_single(&h, 1000).await;

    let response = get(&h.app, format!("/api/videos/{}/stream", id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCEPT_RANGES).unwrap(),
        "bytes"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "video/mp4"
    );
    assert_eq!(body_bytes(response).await, data);
}

#[tokio::test]
async fn test_stream_single_range_forwarded() {
    let h = harness();
    let (id, data) = seed_single(&h, 1000).await;

    let response = get(
        &h.app,
        format!("/api/videos/{}/stream", id),
        Some("bytes=100-199"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_RANGE)
            .unwrap()
            .to_str()
            .unwrap(),
        "bytes 100-199/1000"
    );
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_LENGTH)
            .unwrap()
            .to_str()
            .unwrap(),
        "100"
    );

    let body = body_bytes(response).await;
    assert_eq!(body.len(), 100);
    assert_eq!(body, data[100..200].to_vec());
}

#[tokio::test]
async fn test_stream_single_open_ended_and_suffix_ranges() {
    let h = harness();
    let (id, data) = seed_single(&h, 1000).await;

    let response = get(
        &h.app,
        format!("/api/videos/{}/stream", id),
        Some("bytes=950-"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(body_bytes(response).await, data[950..].to_vec());

    let response = get(
        &h.app,
        format!("/api/videos/{}/stream", id),
        Some("bytes=-100"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(body_bytes(response).await, data[900..].to_vec());
}

#[tokio::test]
async fn test_stream_single_malformed_range_serves_full() {
    let h = harness();
    let (id, data) = seed_single(&h, 500).await;

    for bad in ["bytes=nonsense", "bytes=", "items=0-10", "bytes=900-"] {
        let response = get(&h.app, format!("/api/videos/{}/stream", id), Some(bad)).await;
        assert_eq!(response.status(), StatusCode::OK, "{bad}");
        assert!(response.headers().get(header::CONTENT_RANGE).is_none());
        assert_eq!(body_bytes(response).await, data);
    }
}

#[tokio::test]
async fn test_stream_chunked_full_is_ordered_concat() {
    let h = harness();
    let chunks = vec![vec![10u8; 400], vec![20u8; 400], vec![30u8; 200]];
    let (id, flat) = seed_chunked(&h, &chunks).await;

    let response = get(&h.app, format!("/api/videos/{}/stream", id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_LENGTH)
            .unwrap()
            .to_str()
            .unwrap(),
        "1000"
    );
    assert_eq!(body_bytes(response).await, flat);
}

#[tokio::test]
async fn test_stream_chunked_range_spans_chunk_boundary() {
    let h = harness();
    let chunks = vec![vec![10u8; 400], vec![20u8; 400], vec![30u8; 200]];
    let (id, flat) = seed_chunked(&h, &chunks).await;

    // 350..=449 covers the tail of chunk 0 and the head of chunk 1.
    let response = get(
        &h.app,
        format!("/api/videos/{}/stream", id),
        Some("bytes=350-449"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_RANGE)
            .unwrap()
            .to_str()
            .unwrap(),
        "bytes 350-449/1000"
    );

    let body = body_bytes(response).await;
    assert_eq!(body.len(), 100);
    assert_eq!(body, flat[350..450].to_vec());
}

#[tokio::test]
async fn test_stream_chunked_range_inside_one_chunk() {
    let h = harness();
    let chunks = vec![vec![1u8; 500], vec![2u8; 500]];
    let (id, flat) = seed_chunked(&h, &chunks).await;

    let response = get(
        &h.app,
        format!("/api/videos/{}/stream", id),
        Some("bytes=100-199"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(body_bytes(response).await, flat[100..200].to_vec());
}

#[tokio::test]
async fn test_stream_chunked_malformed_range_serves_full() {
    let h = harness();
    let chunks = vec![vec![1u8; 100], vec![2u8; 100]];
    let (id, flat) = seed_chunked(&h, &chunks).await;

    let response = get(
        &h.app,
        format!("/api/videos/{}/stream", id),
        Some("bytes=oops"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, flat);
}

#[tokio::test]
async fn test_stream_missing_blob_is_not_found() {
    let h = harness();
    let mut record = VideoRecord::new("org-test", "ghost.mp4", 100);
    let id = record.id;
    record.status = VideoStatus::Processed;
    seed_record(&h.videos, record).await;

    let response = get(&h.app, format!("/api/videos/{}/stream", id), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_hls_manifest_and_segment_headers() {
    let h = harness();
    let (id, _) = seed_single(&h, 100).await;

    let prefix = format!("org-test/{}/hls", id);
    h.blobs.put(
        &format!("{}/master.m3u8", prefix),
        b"#EXTM3U\n#EXT-X-VERSION:3\n".to_vec(),
    );
    h.blobs
        .put(&format!("{}/1080p_000.ts", prefix), vec![0x47; 188]);

    let response = get(&h.app, format!("/api/videos/{}/hls/master.m3u8", id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/x-mpegURL"
    );
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-cache"
    );

    let response = get(&h.app, format!("/api/videos/{}/hls/1080p_000.ts", id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "video/MP2T"
    );
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "max-age=3600"
    );
}

#[tokio::test]
async fn test_hls_unknown_file_is_not_found() {
    let h = harness();
    let (id, _) = seed_single(&h, 100).await;

    let response = get(&h.app, format!("/api/videos/{}/hls/nope.m3u8", id), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_hls_rejects_path_traversal() {
    let h = harness();
    let (id, _) = seed_single(&h, 100).await;

    let response = get(
        &h.app,
        format!("/api/videos/{}/hls/..%2F..%2Fsecret", id),
        None,
    )
    .await;
    // Either the router refuses to match or the handler rejects it; a
    // traversal must never reach the blob store as a nested key.
    assert_ne!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_processing_video_record_is_visible_but_unplayable() {
    let h = harness();
    let record = VideoRecord::new("org-test", "wip.mp4", 100);
    let id = record.id;
    seed_record(&h.videos, record).await;
    set_status(&h.videos, id, VideoStatus::Processing).await;

    let response = get(&h.app, format!("/api/videos/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["status"], "processing");
    assert_eq!(body["hls_manifest_path"], serde_json::Value::Null);

    // No HLS output exists yet.
    let response = get(&h.app, format!("/api/videos/{}/hls/master.m3u8", id), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
