//! WebHarvest library surface.
//!
//! Exposes the config loader for integration testing; the engine itself
//! lives in the workspace crates.

pub mod config;
