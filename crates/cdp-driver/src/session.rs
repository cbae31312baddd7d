//! Browser process lifecycle.

use crate::context::CdpContext;
use crate::driver_error;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::target::CreateBrowserContextParams;
use futures::StreamExt;
use page_primitives::{BrowserSession, BrowsingContext, ContextOptions, DriverError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Launch-time knobs for the shared browser process.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Explicit chrome/chromium binary; autodetected when absent.
    pub executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    pub request_timeout: Duration,
    pub launch_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            user_data_dir: None,
            request_timeout: Duration::from_secs(30),
            launch_timeout: Duration::from_secs(20),
        }
    }
}

/// The one browser process shared by a whole run.
///
/// chromiumoxide hands back the browser handle together with an event
/// stream that must be pumped for any command to make progress; the stream
/// is drained by a background task for the lifetime of the session.
pub struct CdpBrowser {
    browser: Arc<Mutex<Browser>>,
    event_loop: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl CdpBrowser {
    pub async fn launch(options: LaunchOptions) -> Result<Self, DriverError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(options.request_timeout)
            .launch_timeout(options.launch_timeout);
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &options.executable {
            builder = builder.chrome_executable(path);
        }
        if let Some(dir) = &options.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        let config = builder.build().map_err(DriverError::Other)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| DriverError::ConnectionLost(format!("browser launch failed: {err}")))?;
        info!(headless = options.headless, "browser launched");

        let event_loop = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!("cdp event loop: {err}");
                }
            }
        });

        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            event_loop: std::sync::Mutex::new(Some(event_loop)),
        })
    }
}

#[async_trait]
impl BrowserSession for CdpBrowser {
    async fn new_context(
        &self,
        options: &ContextOptions,
    ) -> Result<Arc<dyn BrowsingContext>, DriverError> {
        let response = {
            let browser = self.browser.lock().await;
            browser
                .execute(CreateBrowserContextParams::default())
                .await
                .map_err(|err| driver_error(err, DriverError::Other))?
        };
        let context_id = response.result.browser_context_id.clone();
        debug!(?context_id, "browser context created");
        Ok(Arc::new(CdpContext::new(
            Arc::clone(&self.browser),
            context_id,
            options.clone(),
        )))
    }

    async fn close(&self) -> Result<(), DriverError> {
        {
            let mut browser = self.browser.lock().await;
            browser
                .close()
                .await
                .map_err(|err| driver_error(err, DriverError::Other))?;
            if let Err(err) = browser.wait().await {
                debug!("browser process wait: {err}");
            }
        }
        // The event stream ends once the process is gone; abort is cleanup
        // for the case where close raced with a dying connection.
        if let Ok(mut guard) = self.event_loop.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
        info!("browser closed");
        Ok(())
    }
}
