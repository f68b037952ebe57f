use std::future::Future;

use crate::error::{HarvestError, JobError};
use crate::models::{RawPayload, SourceDescriptor};

/// Executes one source job against an external worker.
///
/// Implementations enforce `source.timeout()` as a hard wall clock: a worker
/// that misses the deadline is forcibly terminated and the run reported as
/// `JobError::Timeout`. Partial output from a killed worker is discarded;
/// a run fully succeeds or fails, there is no partial-credit state.
pub trait SourceRunner: Send + Sync + Clone {
    fn run(
        &self,
        source: &SourceDescriptor,
        query: &str,
        result_cap: usize,
    ) -> impl Future<Output = Result<RawPayload, JobError>> + Send;
}

/// Optional delegate for pulling candidate fragments out of a document when
/// pattern splitting is insufficient (e.g. backed by a text-generation
/// service). Failure must degrade gracefully: the normalizer falls back to
/// pattern splitting instead of failing the job.
pub trait FragmentSuggester: Send + Sync + Clone {
    fn suggest_fragments(
        &self,
        document_text: &str,
    ) -> impl Future<Output = Result<Vec<String>, HarvestError>> + Send;
}

/// Suggester that proposes nothing; pattern splitting only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSuggester;

impl FragmentSuggester for NullSuggester {
    async fn suggest_fragments(&self, _document_text: &str) -> Result<Vec<String>, HarvestError> {
        Ok(Vec::new())
    }
}
