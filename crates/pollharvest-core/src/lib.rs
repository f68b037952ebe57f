pub mod artifact;
pub mod dedup;
pub mod error;
pub mod job;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod registry;
pub mod scheduler;
pub mod testutil;
pub mod traits;

pub use artifact::{Artifact, ArtifactPolicy};
pub use dedup::{DedupConfig, DedupSession, Verdict};
pub use error::{HarvestError, JobError};
pub use job::{Job, JobStatus};
pub use models::{
    ExtractedItem, ExtractionMethod, HarvestReport, HarvestRequest, JobResult, Provenance,
    RawPayload, SourceDescriptor, SurveyBatch, SurveyDoc, WorkerSpec, compute_hash,
};
pub use normalize::{Normalizer, NormalizerConfig};
pub use progress::{HarvestEvent, ProgressObserver, RunningCounts, SilentObserver, TracingObserver};
pub use registry::SourceRegistry;
pub use scheduler::{HarvestScheduler, SchedulerConfig};
pub use traits::{FragmentSuggester, NullSuggester, SourceRunner};
