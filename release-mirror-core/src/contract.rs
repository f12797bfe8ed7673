//! # contract: the object-storage seam of the mirror pipeline
//!
//! This module defines a single trait ([`ObjectSink`]) through which the pipeline
//! writes mirrored files and generated index pages into a bucket. The pipeline treats
//! storage as a write-only sink: it never reads back earlier uploads.
//!
//! ## Interface & Extensibility
//! - Implement [`ObjectSink`] for a new destination (S3/R2 adapter, in-memory test sink).
//! - The bucket is bound when the implementor is constructed; calls only name the key.
//! - Both methods return the number of bytes written on success.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall` so tests can inject per-key upload failures.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Content type for mirrored release files.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Content type for generated index pages.
pub const TEXT_HTML: &str = "text/html";

/// Error surfaced while reading a body stream chunk.
pub type StreamError = Box<dyn std::error::Error + Send + Sync>;

/// A body handed to the sink chunk by chunk, as it arrives from the remote source.
pub type ByteStream = BoxStream<'static, Result<Bytes, StreamError>>;

/// Errors a sink reports for a single write.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The body stream failed before the object was completed.
    #[error("body stream failed after {written} bytes: {reason}")]
    Body { written: u64, reason: String },

    /// The storage backend rejected or failed the write.
    #[error("storage backend error for key {key}: {reason}")]
    Backend { key: String, reason: String },
}

/// Write-only access to one bucket.
///
/// The implementor owns connection handling and credentials; it is shared
/// read-only across all transfers of a run.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectSink: Send + Sync {
    /// Stream `body` into the object at `key`, tagged with `content_type`.
    async fn put_stream(
        &self,
        key: &str,
        body: ByteStream,
        content_type: &str,
    ) -> Result<u64, StorageError>;

    /// Write a rendered HTML document at `key` with content type `text/html`.
    async fn put_html(&self, key: &str, html: String) -> Result<u64, StorageError>;
}
