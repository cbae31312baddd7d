//! The action interpreter: translates one step definition into an
//! [`webharvest_core_types::ActionResult`] against a page handle, enforcing
//! each action's contract and failure policy.
//!
//! Two failure channels exist on purpose. Contract failures (a fill target
//! that is absent, a timeout) travel *inside* the returned `ActionResult` so
//! the runner can log them and keep going. The `Err` channel is reserved for
//! a page handle that became unusable, which ends the job.

mod errors;
mod interpreter;
mod loops;
mod paginate;
mod session;
mod vars;

pub use errors::InterpreterError;
pub use interpreter::{StepInterpreter, DEFAULT_TIMEOUT_MS};
pub use vars::substitute;
