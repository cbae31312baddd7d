//! Driver error types.

use thiserror::Error;

/// Errors surfaced by a page/context/session driver.
///
/// Most variants describe expected scraping hazards the interpreter turns
/// into per-step outcomes. [`DriverError::ConnectionLost`] is the exception:
/// the page handle is unusable and the job must stop.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("browser connection lost: {0}")]
    ConnectionLost(String),

    #[error("driver error: {0}")]
    Other(String),
}

impl DriverError {
    /// Fatal errors make the page handle unusable for the rest of the job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::ConnectionLost(_))
    }
}
