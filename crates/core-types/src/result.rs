//! Result model: per-step outcomes, per-job results and the run summary.

use crate::step::Record;
use crate::FATAL_STEP_INDEX;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of interpreting one step. Transient: produced and consumed within
/// one step execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Record>>,
    /// Pages actually visited, reported by paginate so the runner's
    /// page count is exact instead of re-derived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            pages: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            pages: None,
        }
    }

    pub fn with_data(mut self, data: Vec<Record>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_pages(mut self, pages: u32) -> Self {
        self.pages = Some(pages);
        self
    }
}

/// One captured step failure. Appended to the job's error list; never causes
/// deletion of previously extracted data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepError {
    /// Index of the failing step, or [`FATAL_STEP_INDEX`] for errors that
    /// escaped step dispatch.
    pub step_index: i64,
    pub action: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl StepError {
    pub fn new(step_index: i64, action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step_index,
            action: action.into(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn fatal(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FATAL_STEP_INDEX, action, message)
    }
}

/// Result of one job. Created empty at job start, mutated step by step by the
/// runner, finalized in the cleanup phase, immutable after return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub name: String,
    pub url: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub page_count: u32,
    pub record_count: usize,
    pub data: Vec<Record>,
    pub errors: Vec<StepError>,
}

impl JobResult {
    /// Start a fresh result. `success` starts true and only ever degrades.
    pub fn begin(name: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            url: url.into(),
            started_at: now,
            completed_at: now,
            duration_ms: 0,
            success: true,
            page_count: 1,
            record_count: 0,
            data: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Append extracted records, keeping `record_count` in sync.
    pub fn append_records(&mut self, records: Vec<Record>) {
        self.data.extend(records);
        self.record_count = self.data.len();
    }

    /// Replace the accumulated records. Paginate owns the full multi-page
    /// harvest once invoked, so its data supersedes a preceding extract.
    pub fn replace_records(&mut self, records: Vec<Record>) {
        self.data = records;
        self.record_count = self.data.len();
    }

    /// Record a failure and mark the job unsuccessful.
    pub fn record_error(&mut self, error: StepError) {
        self.errors.push(error);
        self.success = false;
    }

    /// Stamp completion time and duration. Always called, success or not.
    pub fn finish(&mut self) {
        self.completed_at = Utc::now();
        self.duration_ms = (self.completed_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64;
    }

    /// Joined error messages for the persisted metadata block.
    pub fn error_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        Some(
            self.errors
                .iter()
                .map(|e| format!("step {}: {}", e.step_index, e.message))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Aggregated outcome of a whole run. Built once after all jobs settle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub job_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub total_records: usize,
    pub results: Vec<JobResult>,
}

impl RunSummary {
    pub fn from_results(started_at: DateTime<Utc>, results: Vec<JobResult>) -> Self {
        let completed_at = Utc::now();
        let success_count = results.iter().filter(|r| r.success).count();
        Self {
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds().max(0) as u64,
            job_count: results.len(),
            success_count,
            failure_count: results.len() - success_count,
            total_records: results.iter().map(|r| r.record_count).sum(),
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(key: &str, value: &str) -> Record {
        let mut rec = Record::new();
        rec.insert(key.into(), json!(value));
        rec
    }

    #[test]
    fn record_count_tracks_data_len() {
        let mut result = JobResult::begin("job", "https://example.com");
        result.append_records(vec![record("a", "1"), record("a", "2")]);
        assert_eq!(result.record_count, result.data.len());

        result.replace_records(vec![record("b", "1")]);
        assert_eq!(result.record_count, 1);
        assert_eq!(result.record_count, result.data.len());
    }

    #[test]
    fn recording_an_error_clears_success() {
        let mut result = JobResult::begin("job", "https://example.com");
        assert!(result.success);
        result.record_error(StepError::new(2, "fill", "element not found"));
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn summary_aggregates_counts() {
        let started = Utc::now();
        let mut ok = JobResult::begin("ok", "u");
        ok.append_records(vec![record("x", "1")]);
        ok.finish();
        let mut bad = JobResult::begin("bad", "u");
        bad.record_error(StepError::fatal("job", "boom"));
        bad.finish();

        let summary = RunSummary::from_results(started, vec![ok, bad]);
        assert_eq!(summary.job_count, 2);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.failure_count, 1);
        assert_eq!(summary.total_records, 1);
    }
}
