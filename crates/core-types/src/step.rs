//! The step language: one closed set of actions, each with typed parameters.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One extracted record. Field order is preserved for readable output files.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// One field to resolve inside each element matched by an extract step.
///
/// The `selector` is resolved relative to the matched element; a missing
/// sub-element or a missing `attribute` yields `null` for that field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

/// A single step of a scraping job.
///
/// The `action` tag is a closed vocabulary: an unknown action name fails
/// deserialization, which aborts the whole run before any job starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    /// Load a page and wait for the network to go idle.
    Navigate {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Block until a selector is visible or a fixed duration elapsed.
    Wait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Click an element if present. A missing target is tolerated.
    Click { selector: String },

    /// Fill a form field. A missing target is a step failure.
    Fill { selector: String, value: String },

    /// Extract one record per element matching `selector`.
    Extract {
        selector: String,
        fields: Vec<FieldSpec>,
    },

    /// Walk a paginated listing by clicking a next-control until it
    /// disappears or `max_pages` is reached, extracting every page.
    Paginate {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_pages: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_selector: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<Vec<FieldSpec>>,
    },

    /// Run nested steps once per element matching `selector`, substituting
    /// `${index}` and `${total}` into nested step parameters.
    Loop {
        selector: String,
        steps: Vec<Step>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_iterations: Option<u32>,
    },

    /// Go back in history, waiting for the network to settle each time.
    NavigateBack {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<u32>,
    },

    /// Restore cookies and local storage from a saved session snapshot.
    SessionLoad {
        session_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sessions_dir: Option<PathBuf>,
    },

    /// Persist the current cookies and local storage under a session name.
    SessionSave {
        session_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sessions_dir: Option<PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ttl_hours: Option<u64>,
    },
}

impl Step {
    /// The wire name of the action, as it appears in job documents.
    pub fn action_name(&self) -> &'static str {
        match self {
            Step::Navigate { .. } => "navigate",
            Step::Wait { .. } => "wait",
            Step::Click { .. } => "click",
            Step::Fill { .. } => "fill",
            Step::Extract { .. } => "extract",
            Step::Paginate { .. } => "paginate",
            Step::Loop { .. } => "loop",
            Step::NavigateBack { .. } => "navigate-back",
            Step::SessionLoad { .. } => "session-load",
            Step::SessionSave { .. } => "session-save",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_tags_use_kebab_case() {
        let step: Step = serde_yaml::from_str("action: navigate-back\ncount: 2").unwrap();
        assert_eq!(step, Step::NavigateBack { count: Some(2) });
        assert_eq!(step.action_name(), "navigate-back");
    }

    #[test]
    fn unknown_action_fails_deserialization() {
        let parsed: Result<Step, _> = serde_yaml::from_str("action: hover\nselector: .x");
        assert!(parsed.is_err());
    }

    #[test]
    fn extract_step_parses_fields() {
        let yaml = r#"
action: extract
selector: ".item"
fields:
  - name: title
    selector: ".item-title"
  - name: link
    selector: a
    attribute: href
"#;
        let step: Step = serde_yaml::from_str(yaml).unwrap();
        match step {
            Step::Extract { selector, fields } => {
                assert_eq!(selector, ".item");
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[1].attribute.as_deref(), Some("href"));
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn loop_steps_nest() {
        let yaml = r#"
action: loop
selector: ".row"
max_iterations: 3
steps:
  - action: click
    selector: ".row:nth-child(${index})"
"#;
        let step: Step = serde_yaml::from_str(yaml).unwrap();
        match step {
            Step::Loop { steps, .. } => assert_eq!(steps[0].action_name(), "click"),
            other => panic!("unexpected step: {other:?}"),
        }
    }
}
