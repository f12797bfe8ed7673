//! Version processor: list one release, transfer its files, write its index.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::index::{now_timestamp, write_version_index, IndexError};
use crate::listing::{fetch_listing, ListingError};
use crate::synchronise::Mirror;
use crate::transfer::transfer_file;

/// What a successfully mirrored release contributes to the global index.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VersionSummary {
    pub version: String,
    /// Key prefix of the release in the bucket, e.g. `22.04/`.
    pub key: String,
    pub last_updated: String,
    /// Names of the files uploaded in this run, in listing order.
    pub files: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error("no files uploaded for version {version} ({attempted} attempted)")]
    NoFilesUploaded { version: String, attempted: usize },

    /// Files were mirrored but `{version}/index.html` does not reflect them.
    #[error("files for version {version} were mirrored but its index could not be written: {source}")]
    IndexWrite {
        version: String,
        #[source]
        source: IndexError,
    },
}

impl VersionError {
    /// True when objects were written for the version without a matching index.
    pub fn is_inconsistent(&self) -> bool {
        matches!(self, VersionError::IndexWrite { .. })
    }
}

/// Mirrors one release.
///
/// A listing failure fails the version before any file is attempted. Individual
/// file failures are logged and skipped; the version fails only when none of its
/// files could be uploaded.
pub async fn process_version(mirror: &Mirror, version: &str) -> Result<VersionSummary, VersionError> {
    let base_url = mirror.config.release_url(version);
    info!(version = %version, url = %base_url, "Processing release");

    let files = fetch_listing(&mirror.client, &base_url, mirror.config.listing_timeout()).await?;

    let mut uploaded = Vec::new();
    let mut skipped = Vec::new();
    for file_name in &files {
        let result = transfer_file(
            &mirror.client,
            mirror.sink.as_ref(),
            &base_url,
            version,
            file_name,
            mirror.config.max_retries,
        )
        .await;
        if result.is_success() {
            uploaded.push(result.file_name);
        } else {
            skipped.push(result.key);
        }
    }

    if !skipped.is_empty() {
        warn!(version = %version, skipped = ?skipped, "Some files were not mirrored");
    }

    if uploaded.is_empty() {
        warn!(version = %version, attempted = files.len(), "No files uploaded for release");
        return Err(VersionError::NoFilesUploaded {
            version: version.to_string(),
            attempted: files.len(),
        });
    }

    write_version_index(
        mirror.sink.as_ref(),
        &mirror.renderer,
        version,
        &uploaded,
        &now_timestamp(),
    )
    .await
    .map_err(|source| {
        error!(version = %version, error = %source, "Release files mirrored but version index write failed");
        VersionError::IndexWrite {
            version: version.to_string(),
            source,
        }
    })?;

    info!(version = %version, files = uploaded.len(), attempted = files.len(), "Successfully processed release");

    Ok(VersionSummary {
        version: version.to_string(),
        key: format!("{version}/"),
        last_updated: now_timestamp(),
        files: uploaded,
    })
}
