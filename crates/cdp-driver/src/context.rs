//! One isolated CDP browser context per job.

use crate::driver_error;
use crate::page::CdpPage;
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{self, CookieParam, TimeSinceEpoch};
use chromiumoxide::cdp::browser_protocol::security::SetIgnoreCertificateErrorsParams;
use chromiumoxide::cdp::browser_protocol::storage::{GetCookiesParams, SetCookiesParams};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateTargetParams, DisposeBrowserContextParams,
};
use page_primitives::{BrowsingContext, ContextOptions, Cookie, DriverError, Page};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub(crate) struct CdpContext {
    browser: Arc<Mutex<Browser>>,
    context_id: BrowserContextId,
    options: ContextOptions,
}

impl CdpContext {
    pub(crate) fn new(
        browser: Arc<Mutex<Browser>>,
        context_id: BrowserContextId,
        options: ContextOptions,
    ) -> Self {
        Self {
            browser,
            context_id,
            options,
        }
    }
}

#[async_trait]
impl BrowsingContext for CdpContext {
    async fn new_page(&self) -> Result<Arc<dyn Page>, DriverError> {
        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(self.context_id.clone())
            .build()
            .map_err(DriverError::Other)?;
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page(params)
                .await
                .map_err(|err| driver_error(err, DriverError::Other))?
        };

        if self.options.ignore_tls_errors {
            page.execute(SetIgnoreCertificateErrorsParams::new(true))
                .await
                .map_err(|err| driver_error(err, DriverError::Other))?;
        }
        if let Some(viewport) = self.options.viewport {
            let metrics = SetDeviceMetricsOverrideParams::builder()
                .width(viewport.width as i64)
                .height(viewport.height as i64)
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .map_err(DriverError::Other)?;
            page.execute(metrics)
                .await
                .map_err(|err| driver_error(err, DriverError::Other))?;
        }

        debug!(?self.context_id, "page opened");
        Ok(Arc::new(CdpPage::new(page)))
    }

    async fn cookies(&self) -> Result<Vec<Cookie>, DriverError> {
        let mut params = GetCookiesParams::default();
        params.browser_context_id = Some(self.context_id.clone());
        let response = {
            let browser = self.browser.lock().await;
            browser
                .execute(params)
                .await
                .map_err(|err| driver_error(err, DriverError::Other))?
        };
        Ok(response.result.cookies.iter().map(from_wire).collect())
    }

    async fn add_cookies(&self, cookies: &[Cookie]) -> Result<(), DriverError> {
        let wire = cookies
            .iter()
            .map(to_wire)
            .collect::<Result<Vec<_>, _>>()?;
        let params = SetCookiesParams::builder()
            .cookies(wire)
            .browser_context_id(self.context_id.clone())
            .build()
            .map_err(DriverError::Other)?;
        let browser = self.browser.lock().await;
        browser
            .execute(params)
            .await
            .map_err(|err| driver_error(err, DriverError::Other))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        let browser = self.browser.lock().await;
        browser
            .execute(DisposeBrowserContextParams::new(self.context_id.clone()))
            .await
            .map_err(|err| driver_error(err, DriverError::Other))?;
        debug!(?self.context_id, "browser context disposed");
        Ok(())
    }
}

fn from_wire(wire: &network::Cookie) -> Cookie {
    // CDP reports -1 and session=true for cookies without an expiry.
    let expires = if wire.session || wire.expires < 0.0 {
        None
    } else {
        Some(wire.expires)
    };
    Cookie {
        name: wire.name.clone(),
        value: wire.value.clone(),
        domain: wire.domain.clone(),
        path: wire.path.clone(),
        expires,
        http_only: wire.http_only,
        secure: wire.secure,
    }
}

fn to_wire(cookie: &Cookie) -> Result<CookieParam, DriverError> {
    let mut builder = CookieParam::builder()
        .name(&cookie.name)
        .value(&cookie.value)
        .domain(&cookie.domain)
        .path(&cookie.path)
        .http_only(cookie.http_only)
        .secure(cookie.secure);
    if let Some(expires) = cookie.expires {
        builder = builder.expires(TimeSinceEpoch::new(expires));
    }
    builder.build().map_err(DriverError::Other)
}
