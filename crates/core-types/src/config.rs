//! Run configuration: the validated, in-memory form of a job document.

use crate::step::Step;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors are fatal to the whole run before execution starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("concurrency must be at least 1")]
    BadConcurrency,

    #[error("scraper at position {0} has an empty name")]
    EmptyName(usize),

    #[error("duplicate scraper name `{0}`")]
    DuplicateName(String),

    #[error("scraper `{0}` has an empty url")]
    EmptyUrl(String),

    #[error("scraper `{name}` step {index}: {reason}")]
    BadStep {
        name: String,
        index: usize,
        reason: String,
    },
}

/// Viewport dimensions applied to a job's browsing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// One configured scraping job. Loaded once per run, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobDefinition {
    pub name: String,
    pub url: String,
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
}

fn default_concurrency() -> usize {
    5
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./results")
}

/// Top-level run configuration. Unknown keys fail deserialization so a
/// malformed document aborts before any job runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(rename = "scrapers")]
    pub jobs: Vec<JobDefinition>,
}

impl RunConfig {
    /// Validate the whole document. Any error here is fatal to the run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::BadConcurrency);
        }

        let mut seen = HashSet::new();
        for (position, job) in self.jobs.iter().enumerate() {
            if job.name.trim().is_empty() {
                return Err(ConfigError::EmptyName(position));
            }
            if !seen.insert(job.name.as_str()) {
                return Err(ConfigError::DuplicateName(job.name.clone()));
            }
            if job.url.trim().is_empty() {
                return Err(ConfigError::EmptyUrl(job.name.clone()));
            }
            for (index, step) in job.steps.iter().enumerate() {
                validate_step(step).map_err(|reason| ConfigError::BadStep {
                    name: job.name.clone(),
                    index,
                    reason,
                })?;
            }
        }
        Ok(())
    }
}

fn validate_step(step: &Step) -> Result<(), String> {
    match step {
        Step::Navigate { url, .. } => {
            if url.trim().is_empty() {
                return Err("navigate requires a url".into());
            }
        }
        Step::Wait {
            selector,
            duration_ms,
            ..
        } => {
            if selector.is_none() && duration_ms.is_none() {
                return Err("wait requires a selector or a duration_ms".into());
            }
        }
        Step::Click { selector } | Step::Fill { selector, .. } => {
            if selector.trim().is_empty() {
                return Err("selector must not be empty".into());
            }
        }
        Step::Extract { selector, fields } => {
            if selector.trim().is_empty() {
                return Err("extract requires a selector".into());
            }
            if fields.is_empty() {
                return Err("extract requires at least one field".into());
            }
        }
        Step::Paginate {
            selector,
            max_pages,
            ..
        } => {
            if selector.trim().is_empty() {
                return Err("paginate requires a next-control selector".into());
            }
            if max_pages == &Some(0) {
                return Err("paginate max_pages must be at least 1".into());
            }
        }
        Step::Loop {
            selector,
            steps,
            max_iterations,
        } => {
            if selector.trim().is_empty() {
                return Err("loop requires a selector".into());
            }
            if steps.is_empty() {
                return Err("loop requires at least one nested step".into());
            }
            if max_iterations == &Some(0) {
                return Err("loop max_iterations must be at least 1".into());
            }
            for nested in steps {
                validate_step(nested)?;
            }
        }
        Step::NavigateBack { count } => {
            if count == &Some(0) {
                return Err("navigate-back count must be at least 1".into());
            }
        }
        Step::SessionLoad { session_name, .. } | Step::SessionSave { session_name, .. } => {
            if session_name.trim().is_empty() {
                return Err("session name must not be empty".into());
            }
        }
    }
    Ok(())
}
