//! The per-job runner: executes one job's step list against one isolated
//! page handle. One step failing never aborts the remaining steps; only a
//! fatal interpreter error (an unusable page handle) stops the loop, and
//! even then the job returns a result. Finalization always runs: the page
//! is closed (close errors are swallowed, they must never mask the job's
//! real outcome) and the timestamps are stamped.

use page_primitives::{BrowsingContext, Page};
use std::sync::Arc;
use step_interpreter::StepInterpreter;
use tracing::{debug, info, warn};
use webharvest_core_types::{JobDefinition, JobResult, Step, StepError};

pub struct JobRunner {
    interpreter: Arc<StepInterpreter>,
}

impl JobRunner {
    pub fn new(interpreter: Arc<StepInterpreter>) -> Self {
        Self { interpreter }
    }

    /// Run every step of `job` in order and assemble its result.
    pub async fn run(
        &self,
        job: &JobDefinition,
        page: Arc<dyn Page>,
        context: Arc<dyn BrowsingContext>,
    ) -> JobResult {
        info!(job = %job.name, steps = job.steps.len(), "job started");
        let mut result = JobResult::begin(&job.name, &job.url);

        for (index, step) in job.steps.iter().enumerate() {
            debug!(job = %job.name, step = index, action = step.action_name(), "dispatching step");
            match self
                .interpreter
                .execute(page.as_ref(), context.as_ref(), step)
                .await
            {
                Ok(outcome) => {
                    let is_paginate = matches!(step, Step::Paginate { .. });
                    if let Some(pages) = outcome.pages {
                        result.page_count = pages;
                    }
                    // Paginate owns the full multi-page harvest once invoked:
                    // its data supersedes a preceding extract instead of
                    // stacking on top of it. Everything else appends.
                    if let Some(data) = outcome.data {
                        if is_paginate {
                            result.replace_records(data);
                        } else {
                            result.append_records(data);
                        }
                    }
                    if !outcome.success {
                        warn!(job = %job.name, step = index, "step failed: {}", outcome.message);
                        result.record_error(StepError::new(
                            index as i64,
                            step.action_name(),
                            outcome.message,
                        ));
                    }
                }
                Err(fatal) => {
                    warn!(job = %job.name, step = index, "fatal error, aborting remaining steps: {fatal}");
                    result.record_error(StepError::fatal(step.action_name(), fatal.to_string()));
                    break;
                }
            }
        }

        // Finalize runs on every path out of the step loop.
        if let Err(err) = page.close().await {
            warn!(job = %job.name, "page close failed (ignored): {err}");
        }
        result.finish();
        info!(
            job = %job.name,
            success = result.success,
            records = result.record_count,
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            "job finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_primitives::testing::{record, FakeContext, FakeDom, FakePage};
    use page_primitives::DriverError;
    use serde_json::json;
    use session_store::SessionStore;
    use std::sync::atomic::Ordering;
    use webharvest_core_types::{FieldSpec, FATAL_STEP_INDEX};

    fn runner(dir: &std::path::Path) -> JobRunner {
        JobRunner::new(Arc::new(StepInterpreter::new(SessionStore::new(dir))))
    }

    fn job(steps: Vec<Step>) -> JobDefinition {
        JobDefinition {
            name: "test-job".into(),
            url: "https://example.com/list".into(),
            steps,
            headless: None,
            viewport: None,
        }
    }

    fn title_fields() -> Vec<FieldSpec> {
        vec![FieldSpec {
            name: "title".into(),
            selector: ".item-title".into(),
            attribute: None,
        }]
    }

    async fn run_with(page: FakePage, steps: Vec<Step>) -> (JobResult, Arc<FakePage>) {
        let dir = tempfile::tempdir().unwrap();
        let context = Arc::new(FakeContext::new(page));
        let page = context.page();
        let result = runner(dir.path())
            .run(&job(steps), page.clone(), context)
            .await;
        (result, page)
    }

    #[tokio::test]
    async fn failing_step_does_not_stop_later_steps() {
        let page = FakePage::with_doms(vec![FakeDom::new().with_extraction(
            ".item",
            vec![record(&[("title", json!("a"))])],
        )]);
        let (result, _) = run_with(
            page,
            vec![
                Step::Fill {
                    selector: "#missing".into(),
                    value: "x".into(),
                },
                Step::Extract {
                    selector: ".item".into(),
                    fields: title_fields(),
                },
            ],
        )
        .await;

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].step_index, 0);
        // the extract after the failure still ran and contributed data
        assert_eq!(result.record_count, 1);
        assert_eq!(result.record_count, result.data.len());
    }

    #[tokio::test]
    async fn tolerant_click_leaves_success_intact() {
        let (result, _) = run_with(
            FakePage::new(),
            vec![Step::Click {
                selector: ".gone".into(),
            }],
        )
        .await;
        assert!(result.success);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn paginate_data_replaces_preceding_extract() {
        // page 1 has 2 items; paginate re-extracts page 1 then page 2
        let page = FakePage::with_doms(vec![
            FakeDom::new()
                .with_elements(".next", 1)
                .with_extraction(
                    ".item",
                    vec![
                        record(&[("n", json!(1))]),
                        record(&[("n", json!(2))]),
                    ],
                ),
            FakeDom::new().with_extraction(
                ".item",
                vec![
                    record(&[("n", json!(3))]),
                    record(&[("n", json!(4))]),
                ],
            ),
        ])
        .with_next_control(".next");

        let (result, _) = run_with(
            page,
            vec![
                Step::Extract {
                    selector: ".item".into(),
                    fields: title_fields(),
                },
                Step::Paginate {
                    selector: ".next".into(),
                    max_pages: None,
                    item_selector: Some(".item".into()),
                    fields: Some(title_fields()),
                },
            ],
        )
        .await;

        assert!(result.success);
        // 4 records total, not 2 (extract) + 4 (paginate)
        assert_eq!(result.record_count, 4);
        assert_eq!(result.page_count, 2);
    }

    #[tokio::test]
    async fn fatal_error_is_recorded_and_stops_the_job() {
        let page = FakePage::with_doms(vec![FakeDom::new()
            .with_elements(".btn", 1)
            .with_extraction(".item", vec![record(&[("n", json!(1))])])])
        .failing_click(".btn", DriverError::ConnectionLost("ws closed".into()));

        let (result, page) = run_with(
            page,
            vec![
                Step::Extract {
                    selector: ".item".into(),
                    fields: title_fields(),
                },
                Step::Click {
                    selector: ".btn".into(),
                },
                Step::Extract {
                    selector: ".item".into(),
                    fields: title_fields(),
                },
            ],
        )
        .await;

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].step_index, FATAL_STEP_INDEX);
        // data extracted before the fatal error survives
        assert_eq!(result.record_count, 1);
        // the job still finalized: page closed, timestamps stamped
        assert!(page.closed.load(Ordering::SeqCst));
        assert!(result.completed_at >= result.started_at);
    }

    #[tokio::test]
    async fn page_close_failure_never_masks_the_outcome() {
        let page = FakePage::with_doms(vec![FakeDom::new().with_extraction(
            ".item",
            vec![record(&[("n", json!(1))])],
        )])
        .failing_close();

        let (result, _) = run_with(
            page,
            vec![Step::Extract {
                selector: ".item".into(),
                fields: title_fields(),
            }],
        )
        .await;
        assert!(result.success);
        assert_eq!(result.record_count, 1);
    }

    #[tokio::test]
    async fn record_count_matches_data_after_failure_paths() {
        let page = FakePage::with_doms(vec![FakeDom::new()
            .with_elements(".next", 1)
            .with_extraction(".item", vec![record(&[("n", json!(1))])])])
        .with_next_control(".next")
        .failing_click(".next", DriverError::Navigation("tab crashed".into()));

        let (result, _) = run_with(
            page,
            vec![Step::Paginate {
                selector: ".next".into(),
                max_pages: None,
                item_selector: Some(".item".into()),
                fields: Some(title_fields()),
            }],
        )
        .await;

        assert!(!result.success);
        // partial harvest from the failed pagination is kept
        assert_eq!(result.record_count, 1);
        assert_eq!(result.record_count, result.data.len());
    }
}
