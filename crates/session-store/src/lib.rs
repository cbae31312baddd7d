//! Persisted session snapshots: cookies plus per-origin local storage,
//! tagged with an expiry.
//!
//! Loading fails closed: a missing file, malformed JSON or an expired
//! snapshot all yield `Ok(None)`, never an error that could abort a job.

use chrono::{DateTime, Duration, Utc};
use page_primitives::{Cookie, OriginState};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_TTL_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("failed to write session `{name}`: {source}")]
    Write {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode session `{name}`: {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Snapshot of a browsing context's network state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub cookies: Vec<Cookie>,
    pub origins: Vec<OriginState>,
    pub saved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// File-per-session store under one directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The same store, rooted elsewhere. Steps may override the directory.
    pub fn rooted_at(&self, root: impl Into<PathBuf>) -> Self {
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize(name)))
    }

    /// Persist a snapshot under `name`, stamping the expiry.
    pub async fn save(
        &self,
        name: &str,
        cookies: Vec<Cookie>,
        origins: Vec<OriginState>,
        ttl_hours: Option<u64>,
    ) -> Result<(), SessionStoreError> {
        let now = Utc::now();
        let ttl = ttl_hours
            .map(|h| Duration::hours(h as i64))
            .unwrap_or_else(|| Duration::hours(DEFAULT_TTL_HOURS));
        let snapshot = SessionSnapshot {
            cookies,
            origins,
            saved_at: now,
            expires_at: now + ttl,
        };

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| SessionStoreError::Write {
                name: name.to_string(),
                source,
            })?;
        let body =
            serde_json::to_vec_pretty(&snapshot).map_err(|source| SessionStoreError::Encode {
                name: name.to_string(),
                source,
            })?;
        let path = self.path_for(name);
        tokio::fs::write(&path, body)
            .await
            .map_err(|source| SessionStoreError::Write {
                name: name.to_string(),
                source,
            })?;
        debug!(session = name, path = %path.display(), "session saved");
        Ok(())
    }

    /// Load a snapshot by name. `Ok(None)` on missing, malformed or expired.
    pub async fn load(&self, name: &str) -> Option<SessionSnapshot> {
        let path = self.path_for(name);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) => {
                debug!(session = name, "session not readable: {err}");
                return None;
            }
        };
        let snapshot: SessionSnapshot = match serde_json::from_slice(&raw) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(session = name, "session file malformed, ignoring: {err}");
                return None;
            }
        };
        if snapshot.is_expired() {
            debug!(session = name, expired_at = %snapshot.expires_at, "session expired");
            return None;
        }
        Some(snapshot)
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}
