//! Directory lister: turns an HTML directory listing into the file names it links to.

use regex::Regex;
use reqwest::{Client, StatusCode};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, error, info};

/// Errors raised while listing one release directory.
#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("failed to fetch release directory {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("directory fetch failed for {url}: HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("no links found in release directory listing {url}")]
    EmptyListing { url: String },
}

fn href_pattern() -> &'static Regex {
    static HREF: OnceLock<Regex> = OnceLock::new();
    HREF.get_or_init(|| Regex::new(r#"href="([^"]+)""#).expect("href pattern is valid"))
}

/// Every `href` value in `html`, in order of appearance.
pub fn extract_links(html: &str) -> Vec<String> {
    href_pattern()
        .captures_iter(html)
        .map(|c| c[1].to_string())
        .collect()
}

/// File names linked from a listing, dropping `../` and sub-directory links.
///
/// Duplicates are kept: a name linked twice is returned twice.
pub fn parse_listing(url: &str, html: &str) -> Result<Vec<String>, ListingError> {
    let links = extract_links(html);
    if links.is_empty() {
        return Err(ListingError::EmptyListing {
            url: url.to_string(),
        });
    }

    Ok(links
        .into_iter()
        .filter(|link| {
            let keep = link != "../" && !link.ends_with('/');
            if !keep {
                debug!(link = %link, "Skipping directory link");
            }
            keep
        })
        .collect())
}

/// GET the listing at `url` and return the linked file names.
pub async fn fetch_listing(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<String>, ListingError> {
    info!(url = %url, "Fetching release directory");

    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            error!(error = ?e, url = %url, "Failed to fetch release directory");
            ListingError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

    let status = response.status();
    if status != StatusCode::OK {
        error!(status = %status, url = %url, "Release directory returned non-200 status");
        return Err(ListingError::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = response.text().await.map_err(|e| {
        error!(error = ?e, url = %url, "Failed to read directory listing body");
        ListingError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        }
    })?;

    let files = parse_listing(url, &body)?;
    info!(url = %url, files = files.len(), "Parsed release directory listing");
    Ok(files)
}
