//! Run orchestration.
//!
//! The orchestrator owns the one browser session shared by the whole run and
//! fans jobs out under a bounded concurrency limit. Each job gets a fresh
//! isolated browsing context that is closed on every path out of the task;
//! a job that fails in any way still appears in the summary, either with its
//! own result or as a synthetic failure. Nothing below the run level ever
//! aborts sibling jobs.

use chrono::Utc;
use job_runner::JobRunner;
use page_primitives::{BrowserSession, ContextOptions, DriverError};
use result_store::ResultStore;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use webharvest_core_types::{JobDefinition, JobResult, RunConfig, RunSummary, StepError};

#[derive(Debug, Error)]
enum JobTaskError {
    #[error("could not open browsing context: {0}")]
    Context(#[source] DriverError),

    #[error("could not open page: {0}")]
    Page(#[source] DriverError),
}

pub struct Orchestrator {
    browser: Arc<dyn BrowserSession>,
    runner: Arc<JobRunner>,
    results: Arc<ResultStore>,
}

impl Orchestrator {
    pub fn new(
        browser: Arc<dyn BrowserSession>,
        runner: Arc<JobRunner>,
        results: Arc<ResultStore>,
    ) -> Self {
        Self {
            browser,
            runner,
            results,
        }
    }

    /// Run every job in `config` and aggregate the summary. The shared
    /// browser session is closed, best-effort, after all jobs settle.
    pub async fn run(&self, config: &RunConfig) -> RunSummary {
        let started_at = Utc::now();
        let concurrency = config.concurrency.max(1);
        info!(
            jobs = config.jobs.len(),
            concurrency, "run started"
        );

        let slots = Arc::new(Semaphore::new(concurrency));
        let mut tasks: JoinSet<JobResult> = JoinSet::new();
        let mut identities: HashMap<tokio::task::Id, (String, String)> = HashMap::new();

        for job in config.jobs.iter().cloned() {
            let browser = Arc::clone(&self.browser);
            let runner = Arc::clone(&self.runner);
            let results = Arc::clone(&self.results);
            let slots = Arc::clone(&slots);
            let identity = (job.name.clone(), job.url.clone());

            let handle = tasks.spawn(async move {
                // A closed semaphore cannot happen here; treat it as a
                // task-level failure rather than panicking.
                let _permit = match slots.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(err) => {
                        return synthetic_failure(&job.name, &job.url, err.to_string());
                    }
                };
                match run_one(browser, runner, results, &job).await {
                    Ok(result) => result,
                    Err(err) => {
                        warn!(job = %job.name, "job task failed: {err}");
                        synthetic_failure(&job.name, &job.url, err.to_string())
                    }
                }
            });
            identities.insert(handle.id(), identity);
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, result)) => results.push(result),
                Err(join_err) => {
                    // A panicked task still shows up in the summary.
                    let (name, url) = identities
                        .get(&join_err.id())
                        .cloned()
                        .unwrap_or_else(|| ("<unknown>".into(), String::new()));
                    warn!(job = %name, "job task panicked: {join_err}");
                    results.push(synthetic_failure(&name, &url, join_err.to_string()));
                }
            }
        }

        if let Err(err) = self.browser.close().await {
            warn!("browser close failed (ignored): {err}");
        }

        let summary = RunSummary::from_results(started_at, results);
        info!(
            jobs = summary.job_count,
            succeeded = summary.success_count,
            failed = summary.failure_count,
            records = summary.total_records,
            duration_ms = summary.duration_ms,
            "run finished"
        );
        summary
    }
}

/// One job: open an isolated context, run the steps, persist the result.
/// The context is closed on every path out, even when the runner or the
/// persistence step failed.
async fn run_one(
    browser: Arc<dyn BrowserSession>,
    runner: Arc<JobRunner>,
    results: Arc<ResultStore>,
    job: &JobDefinition,
) -> Result<JobResult, JobTaskError> {
    let options = ContextOptions::for_job(job.viewport);
    let context = browser
        .new_context(&options)
        .await
        .map_err(JobTaskError::Context)?;
    debug!(job = %job.name, "browsing context opened");

    let outcome = async {
        let page = context.new_page().await.map_err(JobTaskError::Page)?;
        let result = runner.run(job, page, Arc::clone(&context)).await;
        if let Err(err) = results.persist(&result).await {
            warn!(job = %job.name, "result persistence failed (job kept in summary): {err}");
        }
        Ok(result)
    }
    .await;

    if let Err(err) = context.close().await {
        warn!(job = %job.name, "context close failed (ignored): {err}");
    }
    outcome
}

/// A job whose task rejected entirely still appears in the summary.
fn synthetic_failure(name: &str, url: &str, message: String) -> JobResult {
    let mut result = JobResult::begin(name, url);
    result.page_count = 0;
    result.record_error(StepError::fatal("job", message));
    result.finish();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_primitives::testing::{record, FakeBrowser, FakeDom, FakePage};
    use serde_json::json;
    use session_store::SessionStore;
    use std::time::Duration;
    use step_interpreter::StepInterpreter;
    use webharvest_core_types::{FieldSpec, Step};

    fn job(name: &str, url: &str) -> JobDefinition {
        JobDefinition {
            name: name.into(),
            url: url.into(),
            steps: vec![
                Step::Navigate {
                    url: url.into(),
                    timeout_ms: None,
                },
                Step::Extract {
                    selector: ".item".into(),
                    fields: vec![FieldSpec {
                        name: "title".into(),
                        selector: ".t".into(),
                        attribute: None,
                    }],
                },
            ],
            headless: None,
            viewport: None,
        }
    }

    fn orchestrator(
        browser: Arc<FakeBrowser>,
        dir: &std::path::Path,
    ) -> Orchestrator {
        let interpreter = Arc::new(StepInterpreter::new(SessionStore::new(
            dir.join("sessions"),
        )));
        Orchestrator::new(
            browser,
            Arc::new(JobRunner::new(interpreter)),
            Arc::new(ResultStore::new(dir.join("results"))),
        )
    }

    fn config(concurrency: usize, jobs: Vec<JobDefinition>) -> RunConfig {
        RunConfig {
            concurrency,
            output_dir: "./results".into(),
            jobs,
        }
    }

    #[tokio::test]
    async fn concurrency_bound_is_respected() {
        let browser = Arc::new(FakeBrowser::new(|| {
            FakePage::new().with_goto_delay(Duration::from_millis(20))
        }));
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(Arc::clone(&browser), dir.path());

        let jobs = (0..7)
            .map(|i| job(&format!("job-{i}"), "https://example.com"))
            .collect();
        let summary = orchestrator.run(&config(2, jobs)).await;

        assert_eq!(summary.job_count, 7);
        assert!(browser.max_open_contexts() <= 2, "bound violated: {}", browser.max_open_contexts());
        assert_eq!(browser.open_contexts(), 0, "all contexts closed");
    }

    #[tokio::test]
    async fn one_failing_job_does_not_affect_siblings() {
        let browser = Arc::new(FakeBrowser::new(|| {
            FakePage::with_doms(vec![FakeDom::new().with_extraction(
                ".item",
                vec![record(&[("title", json!("ok"))])],
            )])
            .failing_goto(
                "broken.example",
                DriverError::Navigation("dns failure".into()),
            )
        }));
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(Arc::clone(&browser), dir.path());

        let summary = orchestrator
            .run(&config(
                5,
                vec![
                    job("good", "https://example.com"),
                    job("bad", "https://broken.example"),
                ],
            ))
            .await;

        assert_eq!(summary.job_count, 2);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.failure_count, 1);
        let bad = summary.results.iter().find(|r| r.name == "bad").unwrap();
        assert!(!bad.success);
        assert!(bad.errors[0].message.contains("dns failure"));
        assert!(browser.closed.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn results_are_persisted_per_job() {
        let browser = Arc::new(FakeBrowser::new(FakePage::new));
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(browser, dir.path());

        orchestrator
            .run(&config(1, vec![job("solo", "https://example.com")]))
            .await;

        let files: Vec<_> = std::fs::read_dir(dir.path().join("results"))
            .unwrap()
            .collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn summary_counts_records_across_jobs() {
        let browser = Arc::new(FakeBrowser::new(|| {
            FakePage::with_doms(vec![FakeDom::new().with_extraction(
                ".item",
                vec![
                    record(&[("title", json!("a"))]),
                    record(&[("title", json!("b"))]),
                ],
            )])
        }));
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(browser, dir.path());

        let summary = orchestrator
            .run(&config(
                3,
                vec![
                    job("one", "https://example.com/1"),
                    job("two", "https://example.com/2"),
                ],
            ))
            .await;
        assert_eq!(summary.total_records, 4);
        for result in &summary.results {
            assert_eq!(result.record_count, result.data.len());
        }
    }
}
