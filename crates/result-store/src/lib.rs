//! One JSON file per job per run: a `metadata` block and the extracted data.
//!
//! Filenames embed the job name and a timestamp so repeated runs of the same
//! job never collide.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use webharvest_core_types::{JobResult, Record};

#[derive(Debug, Error)]
pub enum ResultStoreError {
    #[error("failed to write result for `{name}`: {source}")]
    Write {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode result for `{name}`: {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize)]
struct ResultMetadata<'a> {
    scraper: &'a str,
    url: &'a str,
    pages_scraped: u32,
    total_records: usize,
    duration_ms: u64,
    scraped_at: String,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct PersistedResult<'a> {
    metadata: ResultMetadata<'a>,
    data: &'a [Record],
}

/// Directory-backed result store.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write the result file and return its path.
    pub async fn persist(&self, result: &JobResult) -> Result<PathBuf, ResultStoreError> {
        let body = PersistedResult {
            metadata: ResultMetadata {
                scraper: &result.name,
                url: &result.url,
                pages_scraped: result.page_count,
                total_records: result.record_count,
                duration_ms: result.duration_ms,
                scraped_at: result
                    .completed_at
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
                error: result.error_summary(),
            },
            data: &result.data,
        };

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| ResultStoreError::Write {
                name: result.name.clone(),
                source,
            })?;

        // Colon-free timestamp so filenames stay portable.
        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.3f");
        let path = self
            .root
            .join(format!("{}_{stamp}.json", sanitize(&result.name)));
        let encoded =
            serde_json::to_vec_pretty(&body).map_err(|source| ResultStoreError::Encode {
                name: result.name.clone(),
                source,
            })?;
        tokio::fs::write(&path, encoded)
            .await
            .map_err(|source| ResultStoreError::Write {
                name: result.name.clone(),
                source,
            })?;
        debug!(job = %result.name, path = %path.display(), "result persisted");
        Ok(path)
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}
