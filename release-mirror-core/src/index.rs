//! Index renderer: summary records + timestamp → HTML, then uploaded through the sink.
//!
//! Rendering is a pure function of its inputs over a fixed template. The built-in
//! templates are compiled in; a directory with `index.html` and `version_index.html`
//! may replace either of them.

use chrono::{DateTime, Utc};
use minijinja::{context, Environment};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::contract::{ObjectSink, StorageError};
use crate::version::VersionSummary;

/// Key of the top-level index page.
pub const GLOBAL_INDEX_KEY: &str = "index.html";

const GLOBAL_TEMPLATE: &str = "index.html";
const VERSION_TEMPLATE: &str = "version_index.html";

const BUILTIN_GLOBAL: &str = include_str!("../templates/index.html");
const BUILTIN_VERSION: &str = include_str!("../templates/version_index.html");

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("failed to read template {path}: {source}")]
    TemplateLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render index: {0}")]
    Render(#[from] minijinja::Error),

    #[error("failed to upload index: {0}")]
    Upload(#[from] StorageError),
}

/// One row of a per-version index.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileEntry {
    pub filename: String,
    pub last_updated: String,
}

/// Key of the per-version index page.
pub fn version_index_key(version: &str) -> String {
    format!("{version}/index.html")
}

/// Human-readable timestamp, e.g. `Monday, January 2, 2006 at 3:04 PM UTC`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%A, %B %-d, %Y at %-I:%M %p UTC").to_string()
}

/// The current time as an index timestamp.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub struct IndexRenderer {
    env: Environment<'static>,
}

impl IndexRenderer {
    /// Renderer over the compiled-in templates.
    pub fn builtin() -> Result<Self, IndexError> {
        let mut env = Environment::new();
        env.add_template(GLOBAL_TEMPLATE, BUILTIN_GLOBAL)?;
        env.add_template(VERSION_TEMPLATE, BUILTIN_VERSION)?;
        Ok(Self { env })
    }

    /// Renderer over caller-supplied template sources.
    pub fn from_sources(global: String, version: String) -> Result<Self, IndexError> {
        let mut env = Environment::new();
        env.add_template_owned(GLOBAL_TEMPLATE, global)?;
        env.add_template_owned(VERSION_TEMPLATE, version)?;
        Ok(Self { env })
    }

    /// Templates from `dir`; a template missing there falls back to the built-in one.
    pub fn from_dir(dir: &Path) -> Result<Self, IndexError> {
        let global = read_or_builtin(&dir.join(GLOBAL_TEMPLATE), BUILTIN_GLOBAL)?;
        let version = read_or_builtin(&dir.join(VERSION_TEMPLATE), BUILTIN_VERSION)?;
        info!(dir = %dir.display(), "Loaded index templates");
        Self::from_sources(global, version)
    }

    pub fn render_global(
        &self,
        releases: &[VersionSummary],
        last_updated: &str,
    ) -> Result<String, IndexError> {
        let template = self.env.get_template(GLOBAL_TEMPLATE)?;
        Ok(template.render(context! { releases, last_updated })?)
    }

    pub fn render_version(&self, version: &str, files: &[FileEntry]) -> Result<String, IndexError> {
        let template = self.env.get_template(VERSION_TEMPLATE)?;
        Ok(template.render(context! { version, files })?)
    }
}

fn read_or_builtin(path: &Path, builtin: &str) -> Result<String, IndexError> {
    if !path.exists() {
        debug!(path = %path.display(), "Template override not present, using built-in");
        return Ok(builtin.to_string());
    }
    std::fs::read_to_string(path).map_err(|source| IndexError::TemplateLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Renders and uploads `{version}/index.html` listing `files`, stamped `last_updated`.
pub async fn write_version_index(
    sink: &dyn ObjectSink,
    renderer: &IndexRenderer,
    version: &str,
    files: &[String],
    last_updated: &str,
) -> Result<u64, IndexError> {
    let entries: Vec<FileEntry> = files
        .iter()
        .map(|f| FileEntry {
            filename: f.clone(),
            last_updated: last_updated.to_string(),
        })
        .collect();
    let html = renderer.render_version(version, &entries)?;
    let key = version_index_key(version);
    let written = sink.put_html(&key, html).await?;
    info!(key = %key, files = files.len(), "Uploaded version index");
    Ok(written)
}

/// Renders and uploads the top-level `index.html` over all `releases`.
pub async fn write_global_index(
    sink: &dyn ObjectSink,
    renderer: &IndexRenderer,
    releases: &[VersionSummary],
    last_updated: &str,
) -> Result<u64, IndexError> {
    let html = renderer.render_global(releases, last_updated)?;
    let written = sink.put_html(GLOBAL_INDEX_KEY, html).await?;
    info!(key = GLOBAL_INDEX_KEY, releases = releases.len(), "Uploaded global index");
    Ok(written)
}
