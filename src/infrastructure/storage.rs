use aws_sdk_s3::config::Region;
use std::env;
use std::sync::Arc;
use tracing::info;

use crate::services::storage::S3BlobStore;

/// Build the S3/MinIO-backed blob store from the environment and make sure
/// the bucket exists.
pub async fn setup_storage() -> anyhow::Result<Arc<S3BlobStore>> {
    let endpoint_url =
        env::var("S3_ENDPOINT").map_err(|_| anyhow::anyhow!("S3_ENDPOINT must be set"))?;
    let access_key =
        env::var("S3_ACCESS_KEY").map_err(|_| anyhow::anyhow!("S3_ACCESS_KEY must be set"))?;
    let secret_key =
        env::var("S3_SECRET_KEY").map_err(|_| anyhow::anyhow!("S3_SECRET_KEY must be set"))?;
    let bucket = env::var("S3_BUCKET").unwrap_or_else(|_| "videos".to_string());

    info!("Blob storage: {} (bucket: {})", endpoint_url, bucket);

    let aws_config = aws_config::from_env()
        .endpoint_url(&endpoint_url)
        .region(Region::new("us-east-1"))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key, secret_key, None, None, "static",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    match s3_client.head_bucket().bucket(&bucket).send().await {
        Ok(_) => info!("Bucket '{}' is ready", bucket),
        Err(_) => {
            info!("Bucket '{}' not found, creating...", bucket);
            s3_client
                .create_bucket()
                .bucket(&bucket)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("failed to create bucket '{}': {}", bucket, e))?;
            info!("Bucket '{}' created", bucket);
        }
    }

    Ok(Arc::new(S3BlobStore::new(s3_client, bucket)))
}
