//! Chrome DevTools Protocol driver.
//!
//! Implements the `page-primitives` traits on top of chromiumoxide: one
//! launched browser process per run, one CDP browser context per job, one
//! target per page handle. Transport-level failures (websocket gone, no
//! response from the browser) map to [`DriverError::ConnectionLost`]; all
//! other protocol errors map to the hazard variant the call site expects.

mod context;
mod page;
mod script;
mod session;

pub use session::{CdpBrowser, LaunchOptions};

use chromiumoxide::error::CdpError;
use page_primitives::DriverError;

/// Classify a chromiumoxide error. The `fallback` constructor supplies the
/// hazard variant for errors that are neither fatal nor a timeout.
pub(crate) fn driver_error(
    err: CdpError,
    fallback: impl FnOnce(String) -> DriverError,
) -> DriverError {
    match err {
        CdpError::Ws(err) => DriverError::ConnectionLost(err.to_string()),
        CdpError::ChannelSendError(err) => DriverError::ConnectionLost(format!("{err:?}")),
        CdpError::NoResponse => {
            DriverError::ConnectionLost("no response from the browser".to_string())
        }
        CdpError::Timeout => DriverError::Timeout("browser command".to_string()),
        CdpError::JavascriptException(details) => DriverError::Evaluation(details.text.clone()),
        other => fallback(other.to_string()),
    }
}
