//! Loop execution: run nested steps once per matched element.
//!
//! The element count is snapshotted up front, then re-queried before each
//! iteration because the DOM may have changed underneath us; the loop stops
//! early, without raising, when fewer elements remain. Nested step failures
//! are logged and iteration continues; only a loop selector that cannot be
//! queried at all fails the step.

use crate::errors::{tolerable, InterpreterError};
use crate::interpreter::StepInterpreter;
use crate::vars;
use page_primitives::{BrowsingContext, Page};
use tracing::{debug, warn};
use webharvest_core_types::{ActionResult, Record, Step};

pub(crate) async fn run(
    interpreter: &StepInterpreter,
    page: &dyn Page,
    context: &dyn BrowsingContext,
    selector: &str,
    steps: &[Step],
    max_iterations: Option<u32>,
) -> Result<ActionResult, InterpreterError> {
    // Zero matches is a normal zero-iteration loop, but a selector that
    // cannot be queried at all is a config bug and fails the step, the
    // same way extract treats a broken selector.
    let snapshot = match page.count(selector).await {
        Ok(count) => count,
        Err(err) => {
            let err = tolerable(err)?;
            return Ok(ActionResult::fail(format!(
                "loop selector {selector} could not be counted: {err}"
            )));
        }
    };
    let planned = match max_iterations {
        Some(max) => snapshot.min(max as usize),
        None => snapshot,
    };
    debug!(selector, snapshot, planned, "starting loop");

    let mut collected: Vec<Record> = Vec::new();
    let mut completed = 0usize;

    for index in 0..planned {
        let remaining = match page.count(selector).await {
            Ok(count) => count,
            Err(err) => {
                let err = tolerable(err)?;
                warn!(selector, iteration = index, "re-query failed, stopping loop: {err}");
                break;
            }
        };
        if remaining <= index {
            debug!(
                selector,
                iteration = index,
                remaining,
                "fewer elements than expected, stopping loop early"
            );
            break;
        }

        for nested in steps {
            let concrete = vars::substitute(nested, index, planned);
            match interpreter.execute(page, context, &concrete).await {
                Ok(outcome) => {
                    if !outcome.success {
                        warn!(
                            action = concrete.action_name(),
                            iteration = index,
                            "nested step failed, continuing: {}",
                            outcome.message
                        );
                    }
                    if let Some(data) = outcome.data {
                        collected.extend(data);
                    }
                }
                Err(fatal) => return Err(fatal),
            }
        }
        completed += 1;
    }

    Ok(ActionResult::ok(format!(
        "loop over {selector} ran {completed} iteration(s)"
    ))
    .with_data(collected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_primitives::testing::{record, FakeContext, FakeDom, FakePage};
    use serde_json::json;
    use session_store::SessionStore;

    fn interpreter(dir: &std::path::Path) -> StepInterpreter {
        StepInterpreter::new(SessionStore::new(dir))
    }

    async fn run_loop(page: FakePage, step: Step) -> (ActionResult, std::sync::Arc<FakePage>) {
        let dir = tempfile::tempdir().unwrap();
        let context = FakeContext::new(page);
        let page = context.page();
        let outcome = interpreter(dir.path())
            .execute(page.as_ref(), &context, &step)
            .await
            .unwrap();
        (outcome, page)
    }

    #[tokio::test]
    async fn iterates_once_per_element_with_substitution() {
        let page = FakePage::with_doms(vec![FakeDom::new().with_elements(".row", 3)]);
        let (outcome, page) = run_loop(
            page,
            Step::Loop {
                selector: ".row".into(),
                steps: vec![Step::Click {
                    selector: ".row-${index}-of-${total}".into(),
                }],
                max_iterations: None,
            },
        )
        .await;
        assert!(outcome.success);
        assert!(outcome.message.contains("3 iteration(s)"));
        let log = page.action_log();
        // tolerant clicks: targets absent, but substitution is visible
        assert!(log.is_empty(), "tolerant click never reaches the driver: {log:?}");
    }

    #[tokio::test]
    async fn substituted_selectors_reach_the_driver() {
        let page = FakePage::with_doms(vec![FakeDom::new()
            .with_elements(".row", 2)
            .with_elements(".row-0-of-2", 1)
            .with_elements(".row-1-of-2", 1)]);
        let (outcome, page) = run_loop(
            page,
            Step::Loop {
                selector: ".row".into(),
                steps: vec![Step::Click {
                    selector: ".row-${index}-of-${total}".into(),
                }],
                max_iterations: None,
            },
        )
        .await;
        assert!(outcome.success);
        let log = page.action_log();
        assert!(log.contains(&"click .row-0-of-2".to_string()));
        assert!(log.contains(&"click .row-1-of-2".to_string()));
    }

    #[tokio::test]
    async fn max_iterations_caps_the_loop() {
        let page = FakePage::with_doms(vec![FakeDom::new().with_elements(".row", 5)]);
        let (outcome, _) = run_loop(
            page,
            Step::Loop {
                selector: ".row".into(),
                steps: vec![Step::Wait {
                    selector: None,
                    duration_ms: Some(1),
                    timeout_ms: None,
                }],
                max_iterations: Some(2),
            },
        )
        .await;
        assert!(outcome.success);
        assert!(outcome.message.contains("2 iteration(s)"));
    }

    #[tokio::test]
    async fn stops_early_when_the_dom_shrinks() {
        // clicking .advance flips to a DOM where only one .row remains
        let page = FakePage::with_doms(vec![
            FakeDom::new()
                .with_elements(".row", 3)
                .with_elements(".advance", 1),
            FakeDom::new().with_elements(".row", 1),
        ])
        .with_next_control(".advance");
        let (outcome, _) = run_loop(
            page,
            Step::Loop {
                selector: ".row".into(),
                steps: vec![Step::Click {
                    selector: ".advance".into(),
                }],
                max_iterations: None,
            },
        )
        .await;
        assert!(outcome.success);
        assert!(outcome.message.contains("1 iteration(s)"));
    }

    #[tokio::test]
    async fn nested_failures_do_not_stop_iteration() {
        let page = FakePage::with_doms(vec![FakeDom::new().with_elements(".row", 2)]);
        let (outcome, _) = run_loop(
            page,
            Step::Loop {
                selector: ".row".into(),
                steps: vec![Step::Fill {
                    selector: "#missing".into(),
                    value: "x".into(),
                }],
                max_iterations: None,
            },
        )
        .await;
        // both iterations ran despite the nested failures, and the loop
        // itself reports success
        assert!(outcome.success);
        assert!(outcome.message.contains("2 iteration(s)"));
    }

    #[tokio::test]
    async fn nested_extract_data_is_collected() {
        let page = FakePage::with_doms(vec![FakeDom::new()
            .with_elements(".row", 2)
            .with_extraction(".card", vec![record(&[("id", json!("c"))])])]);
        let (outcome, _) = run_loop(
            page,
            Step::Loop {
                selector: ".row".into(),
                steps: vec![Step::Extract {
                    selector: ".card".into(),
                    fields: vec![webharvest_core_types::FieldSpec {
                        name: "id".into(),
                        selector: ".id".into(),
                        attribute: None,
                    }],
                }],
                max_iterations: None,
            },
        )
        .await;
        assert_eq!(outcome.data.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unqueryable_loop_selector_fails_the_step() {
        let page = FakePage::new().failing_count(
            ".row[",
            page_primitives::DriverError::InvalidSelector {
                selector: ".row[".into(),
                reason: "unexpected token".into(),
            },
        );
        let (outcome, _) = run_loop(
            page,
            Step::Loop {
                selector: ".row[".into(),
                steps: vec![Step::Click {
                    selector: ".x".into(),
                }],
                max_iterations: None,
            },
        )
        .await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("could not be counted"));
    }

    #[tokio::test]
    async fn zero_elements_means_zero_iterations() {
        let page = FakePage::new();
        let (outcome, _) = run_loop(
            page,
            Step::Loop {
                selector: ".row".into(),
                steps: vec![Step::Click {
                    selector: ".x".into(),
                }],
                max_iterations: Some(10),
            },
        )
        .await;
        assert!(outcome.success);
        assert!(outcome.message.contains("0 iteration(s)"));
    }
}
