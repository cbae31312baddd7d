//! Capability boundary to the browser-automation collaborator.
//!
//! The engine never talks to a browser directly; it talks to these traits.
//! `cdp-driver` provides the real implementation, [`testing`] provides
//! scripted in-memory fakes shared by the engine crates' tests.

mod error;
mod model;
mod traits;

pub mod testing;

pub use error::DriverError;
pub use model::{ContextOptions, Cookie, OriginState};
pub use traits::{BrowserSession, BrowsingContext, Page};
