//! Plain data carried across the driver boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use webharvest_core_types::Viewport;

/// One browser cookie, in the shape session snapshots persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Unix timestamp in seconds; `None` for session cookies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

fn default_path() -> String {
    "/".to_string()
}

/// Local storage of one origin, as persisted in session snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginState {
    pub origin: String,
    #[serde(rename = "localStorage")]
    pub local_storage: BTreeMap<String, String>,
}

/// Options applied when opening an isolated browsing context.
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    pub viewport: Option<Viewport>,
    /// Scraping targets routinely carry broken certificate chains.
    pub ignore_tls_errors: bool,
}

impl ContextOptions {
    pub fn for_job(viewport: Option<Viewport>) -> Self {
        Self {
            viewport,
            ignore_tls_errors: true,
        }
    }
}
