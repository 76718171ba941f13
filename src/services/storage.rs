use async_trait::async_trait;
use aws_sdk_s3::operation::get_object::GetObjectOutput;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

impl BlobError {
    pub fn backend<E: Into<anyhow::Error>>(err: E) -> Self {
        BlobError::Backend(err.into())
    }
}

pub type BlobResult<T> = Result<T, BlobError>;

/// Named-object storage. The ingestion pipeline only ever talks to this
/// trait; production wires in [`S3BlobStore`], tests use an in-memory fake.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> BlobResult<()>;
    async fn get_object(&self, key: &str) -> BlobResult<Vec<u8>>;
    /// Streaming get of the whole object.
    async fn get_object_stream(&self, key: &str) -> BlobResult<GetObjectOutput>;
    /// Streaming get with an HTTP `Range` header value forwarded verbatim.
    async fn get_object_range(&self, key: &str, range: &str) -> BlobResult<GetObjectOutput>;
    async fn delete_object(&self, key: &str) -> BlobResult<()>;
    async fn object_exists(&self, key: &str) -> BlobResult<bool>;
}

pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> BlobResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(BlobError::backend)?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> BlobResult<Vec<u8>> {
        let res = self.get_object_stream(key).await?;
        let data = res
            .body
            .collect()
            .await
            .map_err(BlobError::backend)?
            .to_vec();
        Ok(data)
    }

    async fn get_object_stream(&self, key: &str) -> BlobResult<GetObjectOutput> {
        self.client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    BlobError::NotFound(key.to_string())
                } else {
                    BlobError::backend(service_error)
                }
            })
    }

    async fn get_object_range(&self, key: &str, range: &str) -> BlobResult<GetObjectOutput> {
        self.client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .range(range)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    BlobError::NotFound(key.to_string())
                } else {
                    BlobError::backend(service_error)
                }
            })
    }

    async fn delete_object(&self, key: &str) -> BlobResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(BlobError::backend)?;
        Ok(())
    }

    async fn object_exists(&self, key: &str) -> BlobResult<bool> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(BlobError::backend(service_error))
                }
            }
        }
    }
}
