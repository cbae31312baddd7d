//! Shared primitives for the webharvest scraping engine.
//!
//! Everything that flows between the interpreter, the runner and the
//! orchestrator lives here: the step language, job/run configuration and the
//! result model.

mod config;
mod result;
mod step;

pub use config::{ConfigError, JobDefinition, RunConfig, Viewport};
pub use result::{ActionResult, JobResult, RunSummary, StepError};
pub use step::{FieldSpec, Record, Step};

/// Step index used for errors that are not attributable to a single step
/// (an exception escaping step dispatch, or a job task that failed outright).
pub const FATAL_STEP_INDEX: i64 = -1;
