use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Region used when the config leaves it empty (Cloudflare R2 accepts `auto`).
pub const DEFAULT_REGION: &str = "auto";

/// Placeholder bucket name written by `init`; never valid for a run.
pub const PLACEHOLDER_BUCKET: &str = "your-bucket-name";

/// Directory listing URL for a release; `{version}` is substituted per release.
pub const DEFAULT_SOURCE_URL: &str = "https://releases.ubuntu.com/{version}/";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LISTING_TIMEOUT_SECS: u64 = 60;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;

/// Mirror configuration as read from the YAML config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Release identifiers to mirror, in order.
    #[serde(default)]
    pub releases: Vec<String>,
    pub bucket: String,
    #[serde(default)]
    pub region: String,
    #[serde(default = "default_source_url")]
    pub source_url: String,
    /// Extra attempts per file after the first one fails.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_listing_timeout_secs")]
    pub listing_timeout_secs: u64,
    /// Longest silence tolerated between reads of a response body.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Directory holding `index.html` / `version_index.html` template overrides.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
}

fn default_source_url() -> String {
    DEFAULT_SOURCE_URL.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_listing_timeout_secs() -> u64 {
    DEFAULT_LISTING_TIMEOUT_SECS
}

fn default_read_timeout_secs() -> u64 {
    DEFAULT_READ_TIMEOUT_SECS
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("please set a valid bucket name in the config file")]
    InvalidBucket,

    #[error("please specify at least one release")]
    NoReleases,

    #[error("release identifiers must not be empty")]
    EmptyRelease,

    #[error("source_url must contain the {{version}} placeholder: {0}")]
    InvalidSourceUrl(String),
}

impl MirrorConfig {
    /// Minimal config: the given releases and bucket, everything else defaulted.
    pub fn new(releases: Vec<String>, bucket: impl Into<String>) -> Self {
        Self {
            releases,
            bucket: bucket.into(),
            region: DEFAULT_REGION.to_string(),
            source_url: default_source_url(),
            max_retries: 0,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            listing_timeout_secs: DEFAULT_LISTING_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            templates_dir: None,
        }
    }

    /// Checks required fields and fills in defaults for optional ones.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let bucket = self.bucket.trim();
        if bucket.is_empty() || bucket == PLACEHOLDER_BUCKET {
            return Err(ConfigError::InvalidBucket);
        }
        if self.releases.is_empty() {
            return Err(ConfigError::NoReleases);
        }
        if self.releases.iter().any(|r| r.trim().is_empty()) {
            return Err(ConfigError::EmptyRelease);
        }
        if !self.source_url.contains("{version}") {
            return Err(ConfigError::InvalidSourceUrl(self.source_url));
        }
        if self.region.trim().is_empty() {
            self.region = DEFAULT_REGION.to_string();
        }
        Ok(self)
    }

    /// Base URL of the directory listing for `version`, always ending in `/`.
    pub fn release_url(&self, version: &str) -> String {
        let mut url = self.source_url.replace("{version}", version);
        if !url.ends_with('/') {
            url.push('/');
        }
        url
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn trace_loaded(&self) {
        info!(
            releases = self.releases.len(),
            bucket = %self.bucket,
            region = %self.region,
            "Loaded mirror config"
        );
        debug!(?self, "Mirror config loaded (full debug)");
    }
}
