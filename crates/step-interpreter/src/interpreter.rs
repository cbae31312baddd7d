//! Step dispatch and the simple action contracts.

use crate::errors::{tolerable, InterpreterError};
use crate::{loops, paginate, session};
use async_recursion::async_recursion;
use page_primitives::{BrowsingContext, DriverError, Page};
use session_store::SessionStore;
use std::time::Duration;
use tracing::debug;
use webharvest_core_types::{ActionResult, FieldSpec, Step};

/// Default timeout for navigation and waits, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Interprets steps against a page handle.
///
/// Holds the session store handle explicitly; nothing here is a singleton
/// and loops recurse through the interpreter itself.
pub struct StepInterpreter {
    sessions: SessionStore,
}

impl StepInterpreter {
    pub fn new(sessions: SessionStore) -> Self {
        Self { sessions }
    }

    /// Execute one step. `Ok` carries the per-contract outcome, including
    /// contract failures as `success = false`; `Err` means the page handle
    /// is unusable.
    #[async_recursion]
    pub async fn execute(
        &self,
        page: &dyn Page,
        context: &dyn BrowsingContext,
        step: &Step,
    ) -> Result<ActionResult, InterpreterError> {
        debug!(action = step.action_name(), "executing step");
        match step {
            Step::Navigate { url, timeout_ms } => self.navigate(page, url, *timeout_ms).await,
            Step::Wait {
                selector,
                duration_ms,
                timeout_ms,
            } => {
                self.wait(page, selector.as_deref(), *duration_ms, *timeout_ms)
                    .await
            }
            Step::Click { selector } => self.click(page, selector).await,
            Step::Fill { selector, value } => self.fill(page, selector, value).await,
            Step::Extract { selector, fields } => self.extract(page, selector, fields).await,
            Step::Paginate {
                selector,
                max_pages,
                item_selector,
                fields,
            } => {
                paginate::run(
                    page,
                    paginate::PaginateParams {
                        next_selector: selector,
                        max_pages: max_pages.unwrap_or(paginate::DEFAULT_MAX_PAGES).max(1),
                        item_selector: item_selector.as_deref(),
                        fields: fields.as_deref(),
                    },
                )
                .await
            }
            Step::Loop {
                selector,
                steps,
                max_iterations,
            } => loops::run(self, page, context, selector, steps, *max_iterations).await,
            Step::NavigateBack { count } => {
                self.navigate_back(page, count.unwrap_or(1).max(1)).await
            }
            Step::SessionLoad {
                session_name,
                sessions_dir,
            } => {
                let store = self.store_for(sessions_dir.as_deref());
                session::load(&store, page, context, session_name).await
            }
            Step::SessionSave {
                session_name,
                sessions_dir,
                ttl_hours,
            } => {
                let store = self.store_for(sessions_dir.as_deref());
                session::save(&store, page, context, session_name, *ttl_hours).await
            }
        }
    }

    fn store_for(&self, override_dir: Option<&std::path::Path>) -> SessionStore {
        match override_dir {
            Some(dir) => self.sessions.rooted_at(dir),
            None => self.sessions.clone(),
        }
    }

    async fn navigate(
        &self,
        page: &dyn Page,
        url: &str,
        timeout_ms: Option<u64>,
    ) -> Result<ActionResult, InterpreterError> {
        let timeout = Duration::from_millis(timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS));
        match page.goto(url, timeout).await {
            Ok(()) => Ok(ActionResult::ok(format!("navigated to {url}"))),
            Err(err) => {
                let err = tolerable(err)?;
                Ok(ActionResult::fail(format!(
                    "navigation to {url} failed: {err}"
                )))
            }
        }
    }

    async fn wait(
        &self,
        page: &dyn Page,
        selector: Option<&str>,
        duration_ms: Option<u64>,
        timeout_ms: Option<u64>,
    ) -> Result<ActionResult, InterpreterError> {
        if let Some(selector) = selector {
            let timeout = Duration::from_millis(timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS));
            return match page.wait_for_selector(selector, timeout).await {
                Ok(()) => Ok(ActionResult::ok(format!("selector {selector} appeared"))),
                Err(err) => {
                    let err = tolerable(err)?;
                    Ok(ActionResult::fail(format!(
                        "wait for {selector} failed: {err}"
                    )))
                }
            };
        }
        if let Some(ms) = duration_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            return Ok(ActionResult::ok(format!("waited {ms}ms")));
        }
        // Config validation rejects this shape; kept for direct callers.
        Ok(ActionResult::fail(
            "wait requires a selector or a duration_ms",
        ))
    }

    /// Click is tolerant: scraping targets are unreliable and an absent
    /// element is a normal outcome, never a reason to degrade the job.
    async fn click(
        &self,
        page: &dyn Page,
        selector: &str,
    ) -> Result<ActionResult, InterpreterError> {
        match page.exists(selector).await {
            Ok(false) => {
                debug!(selector, "click target absent, skipping");
                return Ok(ActionResult::ok(format!(
                    "click target {selector} not present, skipping"
                )));
            }
            Ok(true) => {}
            Err(err) => {
                let err = tolerable(err)?;
                return Ok(ActionResult::fail(format!(
                    "could not query {selector}: {err}"
                )));
            }
        }
        match page.click(selector).await {
            Ok(()) => Ok(ActionResult::ok(format!("clicked {selector}"))),
            // The element vanished between the query and the click.
            Err(DriverError::ElementNotFound(_)) => Ok(ActionResult::ok(format!(
                "click target {selector} disappeared, skipping"
            ))),
            Err(err) => {
                let err = tolerable(err)?;
                Ok(ActionResult::fail(format!(
                    "click on {selector} failed: {err}"
                )))
            }
        }
    }

    /// Fill is strict, unlike click: later steps usually depend on the
    /// field actually holding the value.
    async fn fill(
        &self,
        page: &dyn Page,
        selector: &str,
        value: &str,
    ) -> Result<ActionResult, InterpreterError> {
        match page.exists(selector).await {
            Ok(false) => {
                return Ok(ActionResult::fail(format!(
                    "fill target {selector} not found"
                )))
            }
            Ok(true) => {}
            Err(err) => {
                let err = tolerable(err)?;
                return Ok(ActionResult::fail(format!(
                    "could not query {selector}: {err}"
                )));
            }
        }
        match page.fill(selector, value).await {
            Ok(()) => Ok(ActionResult::ok(format!("filled {selector}"))),
            Err(err) => {
                let err = tolerable(err)?;
                Ok(ActionResult::fail(format!(
                    "fill on {selector} failed: {err}"
                )))
            }
        }
    }

    /// Extract never fails on missing elements or fields; only a broken
    /// selector or an evaluation error is a failure.
    async fn extract(
        &self,
        page: &dyn Page,
        selector: &str,
        fields: &[FieldSpec],
    ) -> Result<ActionResult, InterpreterError> {
        match page.extract(selector, fields).await {
            Ok(records) => {
                let message = format!("extracted {} record(s) from {selector}", records.len());
                Ok(ActionResult::ok(message).with_data(records))
            }
            Err(err) => {
                let err = tolerable(err)?;
                Ok(ActionResult::fail(format!(
                    "extract from {selector} failed: {err}"
                )))
            }
        }
    }

    async fn navigate_back(
        &self,
        page: &dyn Page,
        count: u32,
    ) -> Result<ActionResult, InterpreterError> {
        let timeout = Duration::from_millis(DEFAULT_TIMEOUT_MS);
        for done in 0..count {
            if let Err(err) = page.go_back(timeout).await {
                let err = tolerable(err)?;
                return Ok(ActionResult::fail(format!(
                    "navigate-back {}/{count} failed: {err}",
                    done + 1
                )));
            }
            if let Err(err) = page.wait_for_idle_network(timeout).await {
                let err = tolerable(err)?;
                return Ok(ActionResult::fail(format!(
                    "navigate-back {}/{count}: network did not settle: {err}",
                    done + 1
                )));
            }
        }
        Ok(ActionResult::ok(format!("went back {count} page(s)")))
    }
}
