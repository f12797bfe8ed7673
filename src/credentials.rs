//! Storage credentials resolved from the process environment.
//!
//! `R2_*` variables take precedence; each key falls back to its `AWS_*` counterpart.
//! Empty values count as unset. The secret key never appears in `Debug` output or logs.

use std::env;
use std::fmt;
use tracing::{error, info};

pub const ENV_R2_ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
pub const ENV_R2_SECRET_ACCESS_KEY: &str = "R2_SECRET_ACCESS_KEY";
pub const ENV_R2_ENDPOINT_URL: &str = "R2_ENDPOINT_URL";

pub const ENV_AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_AWS_ENDPOINT_URL: &str = "AWS_ENDPOINT_URL";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("storage credentials not found. Set {ENV_R2_ACCESS_KEY_ID} and {ENV_R2_SECRET_ACCESS_KEY} in .env")]
pub struct CredentialsError;

#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: Option<String>,
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

fn env_with_fallback(primary: &str, fallback: &str) -> Option<String> {
    [primary, fallback]
        .into_iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.trim().is_empty())
}

impl StorageCredentials {
    /// Reads credentials fresh from the environment.
    pub fn from_env() -> Result<Self, CredentialsError> {
        let access_key_id = env_with_fallback(ENV_R2_ACCESS_KEY_ID, ENV_AWS_ACCESS_KEY_ID);
        let secret_access_key =
            env_with_fallback(ENV_R2_SECRET_ACCESS_KEY, ENV_AWS_SECRET_ACCESS_KEY);
        let endpoint_url = env_with_fallback(ENV_R2_ENDPOINT_URL, ENV_AWS_ENDPOINT_URL);

        match (access_key_id, secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => {
                info!(
                    endpoint = endpoint_url.as_deref().unwrap_or("<default>"),
                    "Storage credentials found in environment"
                );
                Ok(Self {
                    access_key_id,
                    secret_access_key,
                    endpoint_url,
                })
            }
            (access, secret) => {
                error!(
                    access_key_set = access.is_some(),
                    secret_key_set = secret.is_some(),
                    "Storage credentials missing in environment"
                );
                Err(CredentialsError)
            }
        }
    }
}
