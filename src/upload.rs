//! S3-compatible [`ObjectSink`] backed by the `object_store` crate.
//!
//! Release files are streamed with multipart uploads so no file is ever held in
//! memory as a whole. A failed upload is always aborted so no incomplete multipart
//! upload is left in the bucket. Index pages are small and go up in a single `PUT`.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, MultipartUpload, ObjectStore, PutMultipartOpts,
    PutOptions, PutPayload,
};
use release_mirror_core::contract::{ByteStream, ObjectSink, StorageError, TEXT_HTML};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::credentials::StorageCredentials;

/// Parts kept in flight per multipart upload.
const MAX_CONCURRENT_PARTS: usize = 4;

/// Target part size; S3 requires at least 5 MiB for every part but the last.
const PART_SIZE: usize = 10 * 1024 * 1024;

pub struct ObjectStoreSink {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStoreSink {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Builds an S3 client for `bucket` from credentials read at call time.
    pub fn from_credentials(
        credentials: &StorageCredentials,
        bucket: &str,
        region: &str,
    ) -> Result<Self, object_store::Error> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(region)
            .with_access_key_id(&credentials.access_key_id)
            .with_secret_access_key(&credentials.secret_access_key);

        if let Some(endpoint) = &credentials.endpoint_url {
            builder = builder.with_endpoint(endpoint);
        }

        let store = builder.build()?;
        debug!(bucket, region, "Built S3 object store");
        Ok(Self::new(Arc::new(store), bucket))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn location(key: &str) -> Result<Path, StorageError> {
        Path::parse(key).map_err(|e| backend(key, e))
    }
}

fn backend(key: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError::Backend {
        key: key.to_string(),
        reason: err.to_string(),
    }
}

/// Uploads `body` through `upload` part by part and completes it. On any failure
/// the upload is aborted before the error is returned.
async fn stream_multipart(
    mut upload: Box<dyn MultipartUpload>,
    key: &str,
    body: ByteStream,
) -> Result<u64, StorageError> {
    let outcome = match upload_parts(upload.as_mut(), key, body).await {
        Ok(written) => upload
            .complete()
            .await
            .map(|_| written)
            .map_err(|e| backend(key, e)),
        Err(e) => Err(e),
    };

    if let Err(e) = &outcome {
        warn!(key, error = %e, "Upload failed, aborting multipart upload");
        if let Err(abort_err) = upload.abort().await {
            warn!(key, error = %abort_err, "Failed to abort multipart upload");
        }
    }
    outcome
}

async fn upload_parts(
    upload: &mut dyn MultipartUpload,
    key: &str,
    mut body: ByteStream,
) -> Result<u64, StorageError> {
    let mut in_flight: FuturesUnordered<object_store::UploadPart> = FuturesUnordered::new();
    let mut part: Vec<Bytes> = Vec::new();
    let mut part_len = 0;
    let mut parts_sent = 0;
    let mut written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| StorageError::Body {
            written,
            reason: e.to_string(),
        })?;
        written += chunk.len() as u64;
        part_len += chunk.len();
        part.push(chunk);

        if part_len >= PART_SIZE {
            while in_flight.len() >= MAX_CONCURRENT_PARTS {
                if let Some(res) = in_flight.next().await {
                    res.map_err(|e| backend(key, e))?;
                }
            }
            in_flight.push(upload.put_part(std::mem::take(&mut part).into_iter().collect()));
            part_len = 0;
            parts_sent += 1;
        }
    }

    // An empty body still needs one (empty) part to complete.
    if !part.is_empty() || parts_sent == 0 {
        in_flight.push(upload.put_part(part.into_iter().collect()));
    }
    while let Some(res) = in_flight.next().await {
        res.map_err(|e| backend(key, e))?;
    }
    Ok(written)
}

fn content_type(value: &str) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(
        Attribute::ContentType,
        AttributeValue::from(value.to_string()),
    );
    attributes
}

#[async_trait]
impl ObjectSink for ObjectStoreSink {
    async fn put_stream(
        &self,
        key: &str,
        body: ByteStream,
        content_type_value: &str,
    ) -> Result<u64, StorageError> {
        let location = Self::location(key)?;
        let opts = PutMultipartOpts {
            attributes: content_type(content_type_value),
            ..Default::default()
        };
        let upload = self
            .store
            .put_multipart_opts(&location, opts)
            .await
            .map_err(|e| backend(key, e))?;

        let written = stream_multipart(upload, key, body).await?;
        debug!(key, bucket = %self.bucket, bytes = written, "Streamed object");
        Ok(written)
    }

    async fn put_html(&self, key: &str, html: String) -> Result<u64, StorageError> {
        let location = Self::location(key)?;
        let size = html.len() as u64;
        let opts = PutOptions {
            attributes: content_type(TEXT_HTML),
            ..Default::default()
        };
        self.store
            .put_opts(&location, PutPayload::from(html), opts)
            .await
            .map_err(|e| backend(key, e))?;
        debug!(key, bucket = %self.bucket, bytes = size, "Wrote index page");
        Ok(size)
    }
}
