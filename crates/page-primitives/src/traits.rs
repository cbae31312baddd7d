//! The capability traits the engine consumes.

use crate::error::DriverError;
use crate::model::{ContextOptions, Cookie};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use webharvest_core_types::{FieldSpec, Record};

/// One page handle, exclusively owned by one job for its lifetime.
///
/// Every method is a suspension point; nothing spins synchronously.
#[async_trait]
pub trait Page: Send + Sync {
    /// Load `url` and wait for the network to go idle, up to `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Go back one entry in history, waiting for the network to settle.
    async fn go_back(&self, timeout: Duration) -> Result<(), DriverError>;

    /// Whether any element matches `selector` right now.
    async fn exists(&self, selector: &str) -> Result<bool, DriverError>;

    /// Number of elements matching `selector` right now.
    async fn count(&self, selector: &str) -> Result<usize, DriverError>;

    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError>;

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    async fn wait_for_idle_network(&self, timeout: Duration) -> Result<(), DriverError>;

    /// One record per element matching `selector`, with each field's
    /// sub-selector resolved within that element. Missing sub-elements and
    /// missing attributes yield `null` fields, never an error; zero matches
    /// yield an empty vector.
    async fn extract(
        &self,
        selector: &str,
        fields: &[FieldSpec],
    ) -> Result<Vec<Record>, DriverError>;

    /// Evaluate a script in the page and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError>;

    /// Origin of the document currently loaded in the page.
    async fn current_origin(&self) -> Result<String, DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}

/// One isolated browsing context: fresh cookie jar and storage, owned by
/// exactly one job.
#[async_trait]
pub trait BrowsingContext: Send + Sync {
    async fn new_page(&self) -> Result<Arc<dyn Page>, DriverError>;

    async fn cookies(&self) -> Result<Vec<Cookie>, DriverError>;

    async fn add_cookies(&self, cookies: &[Cookie]) -> Result<(), DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}

/// The shared browser session. Jobs only ever consume `new_context`; its
/// lifecycle belongs to the orchestrator.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_context(
        &self,
        options: &ContextOptions,
    ) -> Result<Arc<dyn BrowsingContext>, DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}
