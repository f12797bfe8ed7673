//! Supervisor: turns a config path into mirror runs, once or on every config change.
//!
//! Each pass reloads the config file, re-reads credentials from the process
//! environment and builds a fresh storage client, so a reload never mutates state an
//! in-flight run is using. `.env` is merged into the environment once at startup;
//! later edits to it need a restart. All passes go through one [`RunGate`].

use anyhow::{Context, Result};
use release_mirror_core::config::MirrorConfig;
use release_mirror_core::contract::ObjectSink;
use release_mirror_core::index::IndexRenderer;
use release_mirror_core::synchronise::{synchronise, Mirror, RunGate, SynchroniseReport};
use release_mirror_core::watch::{ConfigWatcher, WatchError};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::credentials::StorageCredentials;
use crate::load_config::ConfigLoader;
use crate::upload::ObjectStoreSink;

/// Builds the storage sink for a freshly loaded config.
pub type SinkFactory = Arc<dyn Fn(&MirrorConfig) -> Result<Arc<dyn ObjectSink>> + Send + Sync>;

/// Sink factory reading credentials from the process environment on every call.
/// Variables from `.env` are only those loaded at process start.
pub fn env_sink_factory() -> SinkFactory {
    Arc::new(|config: &MirrorConfig| -> Result<Arc<dyn ObjectSink>> {
        let credentials = StorageCredentials::from_env()?;
        let sink = ObjectStoreSink::from_credentials(&credentials, &config.bucket, &config.region)
            .with_context(|| format!("Failed to create storage client for bucket {}", config.bucket))?;
        Ok(Arc::new(sink))
    })
}

#[derive(Clone)]
pub struct App {
    loader: ConfigLoader,
    gate: RunGate,
    sinks: SinkFactory,
}

impl App {
    pub fn new(loader: ConfigLoader) -> Self {
        Self::with_sink_factory(loader, env_sink_factory())
    }

    pub fn with_sink_factory(loader: ConfigLoader, sinks: SinkFactory) -> Self {
        Self {
            loader,
            gate: RunGate::new(),
            sinks,
        }
    }

    pub fn gate(&self) -> &RunGate {
        &self.gate
    }

    /// Loads config, credentials and templates and assembles a [`Mirror`].
    pub fn prepare(&self) -> Result<Mirror> {
        let config = self.loader.load()?;
        let sink = (self.sinks)(&config)?;
        let renderer = match &config.templates_dir {
            Some(dir) => {
                let dir = resolve_templates_dir(self.loader.path(), dir);
                IndexRenderer::from_dir(&dir)
                    .with_context(|| format!("Failed to load templates from {}", dir.display()))?
            }
            None => IndexRenderer::builtin().context("Failed to load built-in templates")?,
        };
        Mirror::new(config, sink, renderer).context("Failed to build HTTP client")
    }

    /// One gated run. `Ok(None)` means another run held the gate and this one was skipped.
    pub async fn run_pass(&self, mirror: &Mirror) -> Result<Option<SynchroniseReport>> {
        let Some(_permit) = self.gate.try_begin() else {
            warn!("Mirror run already in progress, skipping this one");
            return Ok(None);
        };
        info!(
            bucket = %mirror.config().bucket,
            releases = mirror.config().releases.len(),
            "Starting mirror run"
        );
        let report = synchronise(mirror).await?;
        Ok(Some(report))
    }

    /// Prepare and run once, surfacing every failure.
    pub async fn sync_once(&self) -> Result<SynchroniseReport> {
        let mirror = self.prepare()?;
        self.run_pass(&mirror)
            .await?
            .context("Another mirror run is in progress")
    }

    /// Reload everything and run. Failures are logged; the caller keeps going.
    pub async fn reload_and_sync(&self) {
        info!(config_path = %self.loader.path().display(), "Configuration changed, reloading");
        let mirror = match self.prepare() {
            Ok(mirror) => mirror,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to reload configuration, keeping watch");
                return;
            }
        };
        match self.run_pass(&mirror).await {
            Ok(Some(report)) => log_report(&report),
            Ok(None) => {}
            Err(e) => error!(error = %format!("{e:#}"), "Mirror run after reload failed"),
        }
    }

    /// Initial run, then re-run on every settled change to the config file until
    /// interrupted. Startup failures (config, credentials, storage client, watch
    /// setup) are returned; a failed initial run is only logged.
    pub async fn watch(&self, debounce: Duration) -> Result<()> {
        let mirror = self.prepare()?;
        match self.run_pass(&mirror).await {
            Ok(Some(report)) => log_report(&report),
            Ok(None) => {}
            Err(e) => error!(error = %format!("{e:#}"), "Initial mirror run failed"),
        }
        drop(mirror);

        let watcher = ConfigWatcher::new(self.loader.path(), debounce);
        watch_until_interrupted(
            watcher.run(move || self.reload_and_sync()),
            tokio::signal::ctrl_c(),
        )
        .await
    }
}

/// Drives `watching` until it ends or `interrupt` fires. If the interrupt listener
/// cannot be installed, watching carries on until the process is killed.
async fn watch_until_interrupted<W, I>(watching: W, interrupt: I) -> Result<()>
where
    W: Future<Output = Result<(), WatchError>>,
    I: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(watching);
    tokio::select! {
        res = &mut watching => {
            res.context("Config watcher failed")?;
        }
        signal = interrupt => match signal {
            Ok(()) => info!("Interrupt received, stopping watcher"),
            Err(e) => {
                warn!(error = %e, "Cannot listen for interrupts, watching until killed");
                watching.await.context("Config watcher failed")?;
            }
        }
    }
    Ok(())
}

/// Relative template directories are taken relative to the config file.
fn resolve_templates_dir(config_path: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        return dir.to_path_buf();
    }
    config_path
        .parent()
        .map(|parent| parent.join(dir))
        .unwrap_or_else(|| dir.to_path_buf())
}

fn log_report(report: &SynchroniseReport) {
    info!(
        successful = report.releases.len(),
        failed = report.failed.len(),
        "Mirror run complete"
    );
    for failed in report.failed.iter().filter(|f| f.inconsistent) {
        warn!(
            version = %failed.version,
            "Release has mirrored files but no version index"
        );
    }
}
