//! High-level pipeline: mirrors every configured release and regenerates the global index.
//!
//! This module provides the top-level orchestration for one "mirror run":
//!   - Runs the version processor for each configured release, one after another
//!   - Collects a [`VersionSummary`] for every release that mirrored at least one file
//!   - Writes the top-level `index.html` over all successful releases
//!
//! # Major Types
//! - [`Mirror`]: HTTP client, storage sink, renderer and config for a run
//! - [`SynchroniseReport`]: successful summaries plus the releases that failed
//! - [`RunGate`]: single-slot guard keeping runs from overlapping
//!
//! # Error Handling
//! A failing release never stops the others. The run fails with
//! [`SyncError::NoReleasesProcessed`] only when every release failed, in which case
//! no global index is written.

use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info};

use crate::config::MirrorConfig;
use crate::contract::ObjectSink;
use crate::index::{now_timestamp, write_global_index, IndexError, IndexRenderer};
pub use crate::version::{process_version, VersionError, VersionSummary};

/// Everything one mirror run needs. The sink and client are shared read-only by
/// every transfer of the run.
pub struct Mirror {
    pub(crate) config: MirrorConfig,
    pub(crate) client: Client,
    pub(crate) sink: Arc<dyn ObjectSink>,
    pub(crate) renderer: IndexRenderer,
}

impl Mirror {
    /// Builds the HTTP client from the config's timeouts. The read timeout bounds
    /// idle gaps, not whole downloads, so large files still complete.
    pub fn new(
        config: MirrorConfig,
        sink: Arc<dyn ObjectSink>,
        renderer: IndexRenderer,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .user_agent(concat!("release-mirror/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(config, client, sink, renderer))
    }

    pub fn with_client(
        config: MirrorConfig,
        client: Client,
        sink: Arc<dyn ObjectSink>,
        renderer: IndexRenderer,
    ) -> Self {
        Self {
            config,
            client,
            sink,
            renderer,
        }
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }
}

#[derive(Debug, Serialize)]
pub struct SynchroniseReport {
    /// Successfully mirrored releases, in configuration order.
    pub releases: Vec<VersionSummary>,
    pub failed: Vec<FailedRelease>,
}

#[derive(Debug, Serialize)]
pub struct FailedRelease {
    pub version: String,
    pub error: String,
    /// Files were written for this release without a matching index.
    pub inconsistent: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("no releases were successfully processed ({attempted} attempted)")]
    NoReleasesProcessed { attempted: usize },

    #[error("failed to generate global index: {0}")]
    GlobalIndex(#[source] IndexError),
}

/// Entrypoint: one full mirror run over `mirror.config().releases`.
pub async fn synchronise(mirror: &Mirror) -> Result<SynchroniseReport, SyncError> {
    let releases = &mirror.config.releases;
    info!(count = releases.len(), bucket = %mirror.config.bucket, "[SYNC] Processing releases");

    let mut report = SynchroniseReport {
        releases: Vec::new(),
        failed: Vec::new(),
    };

    for version in releases {
        match process_version(mirror, version).await {
            Ok(summary) => report.releases.push(summary),
            Err(e) => {
                error!(version = %version, error = %e, inconsistent = e.is_inconsistent(), "[SYNC][ERROR] Failed to process version");
                report.failed.push(FailedRelease {
                    version: version.clone(),
                    error: e.to_string(),
                    inconsistent: e.is_inconsistent(),
                });
            }
        }
    }

    if report.releases.is_empty() {
        return Err(SyncError::NoReleasesProcessed {
            attempted: releases.len(),
        });
    }

    let last_updated = now_timestamp();
    write_global_index(
        mirror.sink.as_ref(),
        &mirror.renderer,
        &report.releases,
        &last_updated,
    )
    .await
    .map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] Failed to write global index");
        SyncError::GlobalIndex(e)
    })?;

    match serde_json::to_string_pretty(&report) {
        Ok(json) => debug!(json = %json, "[SYNC][DEBUG] Run report"),
        Err(e) => error!(error = ?e, "[SYNC][DEBUG] Failed to serialize run report"),
    }

    info!(
        successful = report.releases.len(),
        failed = report.failed.len(),
        "[SYNC] Processing complete"
    );
    Ok(report)
}

/// Single-slot guard: at most one mirror run holds the permit at a time.
#[derive(Debug, Clone, Default)]
pub struct RunGate {
    slot: Arc<Mutex<()>>,
}

/// Held for the duration of a run; dropping it frees the slot.
pub struct RunPermit {
    _guard: OwnedMutexGuard<()>,
}

impl RunGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// A permit if no run is in progress, `None` otherwise.
    pub fn try_begin(&self) -> Option<RunPermit> {
        self.slot
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| RunPermit { _guard: guard })
    }
}
