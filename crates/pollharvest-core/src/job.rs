use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JobError;
use crate::models::SourceDescriptor;

/// Status of a harvest job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    TimedOut,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::TimedOut => "timed_out",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::TimedOut | JobStatus::Failed
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "timed_out" => Ok(JobStatus::TimedOut),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// One source bound to one harvest request.
///
/// Owned exclusively by the runner while running; the scheduler creates it
/// and receives it back in a terminal state. Terminal states never
/// transition further.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub source: SourceDescriptor,
    pub query: String,
    pub result_cap: usize,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(source: SourceDescriptor, query: impl Into<String>, result_cap: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            query: query.into(),
            result_cap,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_running(&mut self) {
        debug_assert_eq!(self.status, JobStatus::Pending);
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self) {
        debug_assert!(!self.status.is_terminal());
        self.status = JobStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: &JobError) {
        debug_assert!(!self.status.is_terminal());
        self.status = if error.is_timeout() {
            JobStatus::TimedOut
        } else {
            JobStatus::Failed
        };
        self.finished_at = Some(Utc::now());
    }
}
