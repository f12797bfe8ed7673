use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::info;

pub const DEFAULT_CONFIG_YAML: &str = r#"# Release mirror configuration
releases:
  - "22.04"
  - "20.04"
  - "18.04"

# R2/S3 configuration
bucket: "your-bucket-name"
region: "auto"  # "auto" for Cloudflare R2

# Optional
# source_url: "https://releases.ubuntu.com/{version}/"
# max_retries: 0
# templates_dir: "templates"
"#;

pub const DEFAULT_ENV: &str = r#"# Cloudflare R2 configuration
R2_ACCESS_KEY_ID=your-access-key-here
R2_SECRET_ACCESS_KEY=your-secret-key-here
R2_ENDPOINT_URL=https://your-account-id.r2.cloudflarestorage.com

# Fallback AWS compatibility
# AWS_ACCESS_KEY_ID=your-access-key-here
# AWS_SECRET_ACCESS_KEY=your-secret-key-here
"#;

/// Writes `contents` to `path` unless the file already exists. Returns whether it wrote.
pub fn write_if_absent(path: &Path, contents: &str) -> Result<bool> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            info!(path = %path.display(), "File already exists, leaving it untouched");
            return Ok(false);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to create {}", path.display()));
        }
    };
    file.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Created default file");
    Ok(true)
}
