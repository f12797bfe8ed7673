//! File transferer: streams one remote file into the bucket.

use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::contract::{ObjectSink, StorageError, StreamError, OCTET_STREAM};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("download failed for {url}: HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("upload failed: {0}")]
    Upload(#[from] StorageError),
}

/// Outcome of transferring one file; a failure never aborts the batch.
#[derive(Debug)]
pub struct TransferResult {
    pub file_name: String,
    pub key: String,
    /// Bytes written on success.
    pub outcome: Result<u64, TransferError>,
}

impl TransferResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Storage key of a mirrored file.
pub fn object_key(release: &str, file_name: &str) -> String {
    format!("{release}/{file_name}")
}

/// Backoff before retry number `attempt + 1`: doubles from 500 ms, capped at 60 s.
pub fn retry_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(RETRY_MAX_DELAY)
}

/// Downloads `{base_url}{file_name}` and streams it to `{release}/{file_name}`.
///
/// Retries the whole download+upload up to `max_retries` extra times with
/// exponential backoff. Nothing is buffered on local disk.
pub async fn transfer_file(
    client: &Client,
    sink: &dyn ObjectSink,
    base_url: &str,
    release: &str,
    file_name: &str,
    max_retries: u32,
) -> TransferResult {
    let url = format!("{base_url}{file_name}");
    let key = object_key(release, file_name);

    let mut attempt = 0;
    let outcome = loop {
        let outcome = transfer_once(client, sink, &url, &key).await;
        match &outcome {
            Err(e) if attempt < max_retries => {
                let delay = retry_delay(attempt);
                warn!(file = %file_name, attempt = attempt + 1, ?delay, error = %e, "Transfer failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            _ => break outcome,
        }
    };

    match &outcome {
        Ok(bytes) => info!(key = %key, bytes, "Uploaded file"),
        Err(e) => error!(file = %file_name, error = %e, "File transfer failed"),
    }

    TransferResult {
        file_name: file_name.to_string(),
        key,
        outcome,
    }
}

async fn transfer_once(
    client: &Client,
    sink: &dyn ObjectSink,
    url: &str,
    key: &str,
) -> Result<u64, TransferError> {
    info!(url = %url, "Downloading file");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| TransferError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(TransferError::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = response
        .bytes_stream()
        .map_err(|e| Box::new(e) as StreamError)
        .boxed();

    Ok(sink.put_stream(key, body, OCTET_STREAM).await?)
}
