//! Change watcher: reacts to edits of the config file with a debounced callback.
//!
//! Two states: `Idle` waits for a change event; `Debouncing` waits until no further
//! event has arrived for the debounce delay. Each new event during `Debouncing`
//! restarts the wait, so a burst of writes yields a single callback that starts no
//! earlier than the delay after the last event. The callback is awaited inline, so
//! callbacks never overlap; events arriving meanwhile queue up and start a new
//! debounce once it returns.

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("cannot watch config file {path}: {source}")]
    ConfigUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start file watcher: {0}")]
    Notify(#[from] notify::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DebounceState {
    Idle,
    Debouncing { deadline: Instant },
}

/// Calls `on_settled` once per burst of events received on `events`.
///
/// Returns when the sender side is dropped, after firing for any pending burst.
pub async fn debounce<F, Fut>(
    mut events: mpsc::UnboundedReceiver<()>,
    delay: Duration,
    mut on_settled: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut state = DebounceState::Idle;
    loop {
        state = match state {
            DebounceState::Idle => match events.recv().await {
                Some(()) => {
                    debug!(?delay, "Change observed, debouncing");
                    DebounceState::Debouncing {
                        deadline: Instant::now() + delay,
                    }
                }
                None => return,
            },
            DebounceState::Debouncing { deadline } => {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(()) => DebounceState::Debouncing {
                            deadline: Instant::now() + delay,
                        },
                        None => {
                            sleep_until(deadline).await;
                            on_settled().await;
                            return;
                        }
                    },
                    _ = sleep_until(deadline) => {
                        on_settled().await;
                        DebounceState::Idle
                    }
                }
            }
        };
    }
}

/// Whether `event` is a write or create touching the file named `file_name`.
pub fn is_config_change(event: &Event, file_name: &OsString) -> bool {
    let relevant_kind = matches!(
        event.kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Modify(ModifyKind::Any)
    );
    relevant_kind
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

/// Watches one config file and runs a callback after each settled burst of changes.
pub struct ConfigWatcher {
    path: PathBuf,
    delay: Duration,
}

impl ConfigWatcher {
    pub fn new(path: impl Into<PathBuf>, delay: Duration) -> Self {
        Self {
            path: path.into(),
            delay,
        }
    }

    /// Runs until the process ends. Only watch-setup failures are returned.
    ///
    /// The parent directory is watched rather than the file itself so that editors
    /// replacing the file by rename keep triggering reloads.
    pub async fn run<F, Fut>(self, on_change: F) -> Result<(), WatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let (path, file_name) = resolve(&self.path)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("/")).to_path_buf();

        let (tx, rx) = mpsc::unbounded_channel();
        let watched_name = file_name.clone();
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) if is_config_change(&event, &watched_name) => {
                    debug!(kind = ?event.kind, "Config file event");
                    let _ = tx.send(());
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Watcher error"),
            })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        info!(path = %path.display(), delay = ?self.delay, "Watching config file for changes");

        // The watcher owns the sender; keep it alive for as long as we debounce.
        debounce(rx, self.delay, on_change).await;
        drop(watcher);
        Ok(())
    }
}

fn resolve(path: &Path) -> Result<(PathBuf, OsString), WatchError> {
    let unavailable = |source| WatchError::ConfigUnavailable {
        path: path.to_path_buf(),
        source,
    };
    let canonical = std::fs::canonicalize(path).map_err(unavailable)?;
    if !canonical.is_file() {
        return Err(unavailable(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    let file_name = canonical
        .file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| {
            unavailable(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path has no file name",
            ))
        })?;
    Ok((canonical, file_name))
}
