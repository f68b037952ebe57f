use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard errors for pollharvest.
///
/// Per-job failures are *not* represented here; a failed job is a
/// [`JobError`] inside its `JobResult`, and never aborts the harvest.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// The harvest request itself is malformed (empty source list, etc.).
    #[error("invalid harvest request: {0}")]
    InvalidRequest(String),

    /// The session has exhausted its round budget.
    #[error("session round limit reached ({0} rounds)")]
    RoundLimitReached(u32),

    /// The fragment-suggestion delegate failed. Recoverable: the
    /// normalizer falls back to pattern splitting.
    #[error("fragment delegate error: {0}")]
    Delegate(String),
}

/// Categorized outcome of a single failed job.
///
/// All three categories are scoped to one job and are non-retried by this
/// core; a caller wanting a retry issues a new round.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobError {
    /// Worker did not finish before the wall-clock deadline and was killed.
    #[error("worker timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Worker exited non-zero, crashed, or could not be launched.
    #[error("worker failed: {message}")]
    WorkerFailure { message: String },

    /// Worker exited zero but its output did not parse as a payload.
    #[error("malformed worker output: {message}")]
    MalformedOutput { message: String },
}

impl JobError {
    pub fn worker_failure(message: impl Into<String>) -> Self {
        JobError::WorkerFailure {
            message: message.into(),
        }
    }

    pub fn malformed_output(message: impl Into<String>) -> Self {
        JobError::MalformedOutput {
            message: message.into(),
        }
    }

    /// Stable category label for logs and reports.
    pub fn category(&self) -> &'static str {
        match self {
            JobError::Timeout { .. } => "timeout",
            JobError::WorkerFailure { .. } => "worker_failure",
            JobError::MalformedOutput { .. } => "malformed_output",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, JobError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(JobError::Timeout { timeout_secs: 30 }.category(), "timeout");
        assert_eq!(
            JobError::worker_failure("exit 1").category(),
            "worker_failure"
        );
        assert_eq!(
            JobError::malformed_output("bad json").category(),
            "malformed_output"
        );
    }

    #[test]
    fn test_timeout_predicate() {
        assert!(JobError::Timeout { timeout_secs: 5 }.is_timeout());
        assert!(!JobError::worker_failure("boom").is_timeout());
    }

    #[test]
    fn test_job_error_serializes_with_kind_tag() {
        let err = JobError::Timeout { timeout_secs: 120 };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "timeout");
        assert_eq!(json["timeout_secs"], 120);
    }
}
