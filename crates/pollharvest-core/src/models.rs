use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::artifact::Artifact;
use crate::error::{HarvestError, JobError};

/// Opaque command for an external worker.
///
/// `args` entries may contain `{query}` and `{limit}` placeholders; only the
/// runner crate interprets them, the core treats the whole spec as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// How candidate text fragments are pulled out of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Pattern-based splitting (question-mark lines, question-word sentences).
    PatternSplit,
    /// External fragment-suggestion delegate, falling back to patterns.
    Delegated,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::PatternSplit => "pattern_split",
            ExtractionMethod::Delegated => "delegated",
        }
    }
}

fn default_timeout_secs() -> u64 {
    120
}

/// One harvestable data source, supplied by the caller per harvest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Unique key within a harvest request.
    pub id: String,
    pub display_name: String,
    pub worker: WorkerSpec,
    #[serde(default = "SourceDescriptor::default_extraction")]
    pub extraction: ExtractionMethod,
    /// Hard wall-clock budget for one worker run.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra per-source delay before the job is admitted.
    #[serde(default)]
    pub start_delay_ms: u64,
}

impl SourceDescriptor {
    fn default_extraction() -> ExtractionMethod {
        ExtractionMethod::PatternSplit
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }
}

/// A single harvest invocation: one query fanned out to many sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestRequest {
    pub query: String,
    pub sources: Vec<SourceDescriptor>,
    /// Result cap passed to each worker and applied again after extraction.
    pub per_source_cap: usize,
}

impl HarvestRequest {
    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.sources.is_empty() {
            return Err(HarvestError::InvalidRequest("empty source list".into()));
        }
        if self.query.trim().is_empty() {
            return Err(HarvestError::InvalidRequest("empty query".into()));
        }
        if self.per_source_cap == 0 {
            return Err(HarvestError::InvalidRequest(
                "per-source cap must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Structured payload produced by a worker.
///
/// Tagged union: unknown `kind` values fail deserialization at the runner
/// boundary and surface as `MalformedOutput`, never as undefined behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawPayload {
    Surveys(SurveyBatch),
}

impl RawPayload {
    /// Number of documents in the payload.
    pub fn document_count(&self) -> usize {
        match self {
            RawPayload::Surveys(batch) => batch.surveys.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyBatch {
    pub surveys: Vec<SurveyDoc>,
}

/// One survey document as emitted by a source worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyDoc {
    pub survey_code: String,
    #[serde(default)]
    pub survey_date: Option<String>,
    /// Headline question, when the worker already isolated one.
    #[serde(default)]
    pub survey_question: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub embedded_content: String,
    /// Optional base64 capture of the source page.
    #[serde(default)]
    pub preview_image: Option<String>,
}

/// Where an extracted item came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub survey_code: String,
    pub survey_date: Option<String>,
    pub method: ExtractionMethod,
}

/// One canonical candidate item. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub text: String,
    pub source_id: String,
    /// Present only when the document URL parsed as a valid URL.
    pub source_url: Option<String>,
    pub provenance: Provenance,
}

/// Outcome of one job, produced exactly once per submitted source.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub source_id: String,
    pub success: bool,
    pub error: Option<JobError>,
    pub raw_item_count: usize,
    pub unique_items: Vec<ExtractedItem>,
    pub duplicate_count: usize,
    pub artifact: Option<Artifact>,
}

impl JobResult {
    pub fn failed(source_id: impl Into<String>, error: JobError) -> Self {
        Self {
            source_id: source_id.into(),
            success: false,
            error: Some(error),
            raw_item_count: 0,
            unique_items: Vec::new(),
            duplicate_count: 0,
            artifact: None,
        }
    }
}

/// Aggregation of all job results for one scheduler invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HarvestReport {
    pub succeeded_sources: Vec<String>,
    pub failed_sources: Vec<String>,
    pub all_unique_items: Vec<ExtractedItem>,
    pub total_raw: usize,
    pub total_duplicates_removed: usize,
    pub job_results: Vec<JobResult>,
}

impl HarvestReport {
    /// Every submitted job is accounted for, success or not.
    pub fn total_sources(&self) -> usize {
        self.succeeded_sources.len() + self.failed_sources.len()
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
