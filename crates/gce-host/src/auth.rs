//! Cached access token for the Compute Engine API.
//!
//! The token lives in `<store_path>/gce_token`. Acquiring a fresh token
//! interactively happens outside this crate; a token exported as
//! `GCE_ACCESS_TOKEN` is written back to the cache with a bounded lifetime.

use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{Error, Result};

pub const TOKEN_FILE: &str = "gce_token";
pub const TOKEN_ENV: &str = "GCE_ACCESS_TOKEN";

/// How long a token taken from the environment is trusted. Access tokens
/// last an hour; the margin covers the time it sat in the shell.
pub const TOKEN_LIFETIME_MINUTES: i64 = 55;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl CachedToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }
}

pub fn token_path(store_path: &Path) -> PathBuf {
    store_path.join(TOKEN_FILE)
}

/// Return an access token for `store_path`.
///
/// A `GCE_ACCESS_TOKEN` that differs from the cached token replaces it.
/// Without one, the cached token is used until its expiry.
pub async fn obtain_token(store_path: &Path) -> Result<String> {
    let from_env = env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty());
    obtain_token_with(store_path, from_env, Utc::now()).await
}

pub async fn obtain_token_with(
    store_path: &Path,
    from_env: Option<String>,
    now: DateTime<Utc>,
) -> Result<String> {
    let path = token_path(store_path);

    let cached = match token_from_cache(&path).await {
        Ok(cached) => cached,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable token cache");
            None
        }
    };

    match (cached, from_env) {
        (Some(token), Some(env_token)) if token.access_token == env_token => {
            debug!(path = %path.display(), "cached token matches environment");
            Ok(token.access_token)
        }
        (cached, Some(env_token)) => {
            if cached.is_some() {
                info!(path = %path.display(), "replacing cached token with exported token");
            }
            save_token(
                &path,
                &CachedToken {
                    access_token: env_token.clone(),
                    expiry: Some(now + TimeDelta::minutes(TOKEN_LIFETIME_MINUTES)),
                },
            )
            .await;
            Ok(env_token)
        }
        (Some(token), None) if !token.is_expired(now) => {
            debug!(path = %path.display(), "using cached token");
            Ok(token.access_token)
        }
        (cached, None) => {
            if cached.is_some() {
                info!(path = %path.display(), "cached token expired");
            }
            Err(Error::Auth(format!(
                "no valid token in {} and {TOKEN_ENV} is not set; authorize with `gcloud auth print-access-token` and export it",
                path.display()
            )))
        }
    }
}

async fn token_from_cache(path: &Path) -> Result<Option<CachedToken>> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&raw)?))
}

async fn save_token(path: &Path, token: &CachedToken) {
    info!(path = %path.display(), "saving token");
    let result = async {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serde_json::to_vec(token)?).await?;
        Ok::<(), Error>(())
    }
    .await;

    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "failed to cache token");
    }
}
