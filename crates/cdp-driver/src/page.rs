//! One CDP target wrapped as a page handle.

use crate::driver_error;
use crate::script;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CloseParams;
use page_primitives::{DriverError, Page};
use std::time::Duration;
use tracing::trace;
use webharvest_core_types::{FieldSpec, Record};

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub(crate) struct CdpPage {
    inner: chromiumoxide::Page,
}

impl CdpPage {
    pub(crate) fn new(inner: chromiumoxide::Page) -> Self {
        Self { inner }
    }

    async fn eval(&self, expression: &str) -> Result<serde_json::Value, DriverError> {
        let result = self
            .inner
            .evaluate(expression)
            .await
            .map_err(|err| driver_error(err, DriverError::Evaluation))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    /// An invalid CSS selector surfaces as a DOMException inside the page;
    /// reclassify it so callers can tell it apart from a script bug.
    fn selector_error(selector: &str, err: DriverError) -> DriverError {
        match err {
            DriverError::Evaluation(reason)
                if reason.contains("not a valid selector") || reason.contains("SyntaxError") =>
            {
                DriverError::InvalidSelector {
                    selector: selector.to_string(),
                    reason,
                }
            }
            other => other,
        }
    }
}

#[async_trait]
impl Page for CdpPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        trace!(url, "navigating");
        let navigate = async {
            self.inner.goto(url).await?;
            self.inner.wait_for_navigation().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(timeout, navigate).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(driver_error(err, DriverError::Navigation)),
            Err(_) => Err(DriverError::Timeout(format!("navigation to {url}"))),
        }
    }

    async fn go_back(&self, timeout: Duration) -> Result<(), DriverError> {
        self.eval("history.back()").await?;
        self.wait_for_idle_network(timeout).await
    }

    async fn exists(&self, selector: &str) -> Result<bool, DriverError> {
        Ok(self.count(selector).await? > 0)
    }

    async fn count(&self, selector: &str) -> Result<usize, DriverError> {
        let value = self
            .eval(&script::count(selector))
            .await
            .map_err(|err| Self::selector_error(selector, err))?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| DriverError::Evaluation(format!("non-numeric count for `{selector}`")))
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let element = self
            .inner
            .find_element(selector)
            .await
            .map_err(|err| driver_error(err, |_| DriverError::ElementNotFound(selector.to_string())))?;
        element
            .click()
            .await
            .map_err(|err| driver_error(err, DriverError::Other))?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        let element = self
            .inner
            .find_element(selector)
            .await
            .map_err(|err| driver_error(err, |_| DriverError::ElementNotFound(selector.to_string())))?;
        element
            .click()
            .await
            .map_err(|err| driver_error(err, DriverError::Other))?;
        // Typing appends, so any prior value is cleared first.
        self.eval(&script::clear_value(selector)).await?;
        element
            .type_str(value)
            .await
            .map_err(|err| driver_error(err, DriverError::Other))?;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.exists(selector).await? {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::Timeout(format!("selector `{selector}`")));
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn wait_for_idle_network(&self, timeout: Duration) -> Result<(), DriverError> {
        // A page that is already settled emits no further lifecycle events;
        // running out the clock is not a failure here.
        match tokio::time::timeout(timeout, self.inner.wait_for_navigation()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(driver_error(err, DriverError::Navigation)),
            Err(_) => Ok(()),
        }
    }

    async fn extract(
        &self,
        selector: &str,
        fields: &[FieldSpec],
    ) -> Result<Vec<Record>, DriverError> {
        let value = self
            .eval(&script::extract(selector, fields))
            .await
            .map_err(|err| Self::selector_error(selector, err))?;
        serde_json::from_value(value)
            .map_err(|err| DriverError::Evaluation(format!("malformed extraction result: {err}")))
    }

    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, DriverError> {
        self.eval(expression).await
    }

    async fn current_origin(&self) -> Result<String, DriverError> {
        let value = self.eval("window.location.origin").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DriverError::Evaluation("origin is not a string".to_string()))
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.inner
            .execute(CloseParams::default())
            .await
            .map_err(|err| driver_error(err, DriverError::Other))?;
        Ok(())
    }
}
