//! Verification key bootstrap.
//!
//! # Responsibilities
//! - Make sure a verification key exists locally before traffic is accepted
//! - Fetch the key from the authority when it is missing
//! - Ask the authority whether the local copy is current; replace it if not
//!
//! # Design Decisions
//! - A failed consistency check counts as "stale": refetching is cheap and
//!   keeps a rotated key from locking every client out
//! - Fetches retry with exponential backoff; exhausting them fails startup

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::config::AuthConfig;
use crate::resilience::backoff::Backoff;

const PUBLIC_KEY_PATH: &str = "/rpc/auth/publicKey";
const CHECK_KEY_PATH: &str = "/rpc/auth/checkPublicKey";

/// Errors raised while securing a verification key.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Key file {0} not found and no authority configured")]
    Missing(PathBuf),

    #[error("Key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Authority request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authority rejected request with code {code}: {message}")]
    Rejected { code: String, message: String },

    #[error("Authority returned an empty key")]
    EmptyKey,
}

/// Envelope the authority wraps every answer in.
#[derive(Debug, Deserialize)]
pub struct AuthorityResponse<T> {
    pub code: String,
    #[serde(default, alias = "message")]
    pub info: Option<String>,
    pub data: Option<T>,
}

/// Fetch-if-missing, compare-and-update-if-stale.
pub struct KeyBootstrap {
    client: reqwest::Client,
    config: AuthConfig,
}

impl KeyBootstrap {
    pub fn new(config: &AuthConfig) -> Result<Self, KeyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Return the current key material, syncing with the authority when one
    /// is configured.
    pub async fn ensure(&self) -> Result<String, KeyError> {
        let path = PathBuf::from(&self.config.public_key_path);
        let local = read_local(&path).await?;

        let authority = match self.config.authority_url.as_deref() {
            Some(url) => url.trim_end_matches('/'),
            None => {
                tracing::info!(path = %path.display(), "No authority configured, using local key");
                return local.ok_or(KeyError::Missing(path));
            }
        };

        let local = match local {
            Some(local) => local,
            None => {
                tracing::info!(path = %path.display(), "Local key not found, fetching from authority");
                let key = self.fetch_key(authority).await?;
                save_key(&path, &key).await?;
                return Ok(key);
            }
        };

        if self.is_current(authority, &local).await {
            tracing::info!("Local key matches authority");
            return Ok(local);
        }

        tracing::warn!("Local key differs from authority, updating");
        let key = self.fetch_key(authority).await?;
        save_key(&path, &key).await?;
        Ok(key)
    }

    async fn fetch_key(&self, authority: &str) -> Result<String, KeyError> {
        let url = format!("{}{}", authority, PUBLIC_KEY_PATH);
        let url = url.as_str();
        self.retrying("fetch public key", move || async move {
            let response: AuthorityResponse<String> =
                self.client.get(url).send().await?.json().await?;
            let key = self.unwrap_response(response)?.ok_or(KeyError::EmptyKey)?;
            if key.trim().is_empty() {
                return Err(KeyError::EmptyKey);
            }
            Ok(key.trim().to_string())
        })
        .await
    }

    async fn is_current(&self, authority: &str, local: &str) -> bool {
        let url = format!("{}{}", authority, CHECK_KEY_PATH);
        let url = url.as_str();
        let result = self
            .retrying("check public key", move || async move {
                let response: AuthorityResponse<bool> = self
                    .client
                    .post(url)
                    .header(reqwest::header::CONTENT_TYPE, "text/plain")
                    .body(local.to_string())
                    .send()
                    .await?
                    .json()
                    .await?;
                Ok(self.unwrap_response(response)?.unwrap_or(false))
            })
            .await;

        match result {
            Ok(current) => current,
            Err(e) => {
                tracing::error!(error = %e, "Key consistency check failed, treating local key as stale");
                false
            }
        }
    }

    fn unwrap_response<T>(&self, response: AuthorityResponse<T>) -> Result<Option<T>, KeyError> {
        if response.code != self.config.success_code {
            return Err(KeyError::Rejected {
                code: response.code,
                message: response.info.unwrap_or_default(),
            });
        }
        Ok(response.data)
    }

    async fn retrying<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, KeyError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, KeyError>>,
    {
        let backoff = Backoff::new(self.config.fetch_base_delay_ms, self.config.fetch_max_delay_ms);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.config.fetch_attempts => {
                    let delay = backoff.delay(attempt);
                    tracing::warn!(attempt, delay = ?delay, error = %e, "Authority call failed: {}", what);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn read_local(path: &Path) -> Result<Option<String>, KeyError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) if !content.trim().is_empty() => Ok(Some(content.trim().to_string())),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(KeyError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn save_key(path: &Path, key: &str) -> Result<(), KeyError> {
    let io_err = |source: std::io::Error| KeyError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, key).await.map_err(io_err)?;
    tracing::info!(path = %path.display(), "Public key saved");
    Ok(())
}
