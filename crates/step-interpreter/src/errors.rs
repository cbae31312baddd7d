//! Interpreter error types.

use page_primitives::DriverError;
use thiserror::Error;

/// Errors that escape step dispatch. Anything here means the page handle is
/// unusable and the job must stop; ordinary step failures are reported
/// inside `ActionResult` instead.
#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("page handle unusable: {0}")]
    PageUnusable(#[source] DriverError),
}

/// Split a driver error into the two channels: fatal errors bubble as
/// `InterpreterError`, everything else comes back to be folded into the
/// step's `ActionResult`.
pub(crate) fn tolerable(err: DriverError) -> Result<DriverError, InterpreterError> {
    if err.is_fatal() {
        Err(InterpreterError::PageUnusable(err))
    } else {
        Ok(err)
    }
}
