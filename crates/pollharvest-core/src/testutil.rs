//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit and integration
//! tests. Mocks use `Arc<Mutex<_>>`/atomics for interior mutability so
//! tests can assert on recorded calls and observed concurrency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{HarvestError, JobError};
use crate::models::{
    ExtractionMethod, RawPayload, SourceDescriptor, SurveyBatch, SurveyDoc, WorkerSpec,
};
use crate::progress::{HarvestEvent, ProgressObserver, RunningCounts};
use crate::traits::{FragmentSuggester, SourceRunner};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A source descriptor with a dummy worker command.
pub fn make_source(id: &str) -> SourceDescriptor {
    SourceDescriptor {
        id: id.into(),
        display_name: id.to_uppercase(),
        worker: WorkerSpec {
            program: "true".into(),
            args: vec![],
        },
        extraction: ExtractionMethod::PatternSplit,
        timeout_secs: 5,
        start_delay_ms: 0,
    }
}

/// A one-document payload whose content is the given lines joined.
pub fn survey_payload(code: &str, lines: &[&str]) -> RawPayload {
    RawPayload::Surveys(SurveyBatch {
        surveys: vec![SurveyDoc {
            survey_code: code.into(),
            survey_date: None,
            survey_question: None,
            url: None,
            embedded_content: lines.join("\n"),
            preview_image: None,
        }],
    })
}

/// Like [`survey_payload`], with a base64 preview capture attached.
pub fn survey_payload_with_preview(code: &str, lines: &[&str], preview: &str) -> RawPayload {
    let RawPayload::Surveys(mut batch) = survey_payload(code, lines);
    batch.surveys[0].preview_image = Some(preview.into());
    RawPayload::Surveys(batch)
}

// ---------------------------------------------------------------------------
// ConcurrencyGauge
// ---------------------------------------------------------------------------

/// Tracks how many runs are in flight and the high-water mark.
#[derive(Clone, Default)]
pub struct ConcurrencyGauge {
    current: Arc<AtomicUsize>,
    max: Arc<AtomicUsize>,
}

impl ConcurrencyGauge {
    pub fn new() -> Self {
        Self::default()
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max_observed(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// MockRunner
// ---------------------------------------------------------------------------

/// Scripted behavior for one source.
#[derive(Clone)]
pub enum ScriptedOutcome {
    /// Return the payload after an optional delay.
    Payload(RawPayload),
    Fail(JobError),
    /// Never return; the runner's own deadline resolves it to Timeout.
    Hang,
    /// Panic inside the job task.
    Panic,
}

/// Mock runner with per-source scripted outcomes.
///
/// Mirrors the real runner contract: the timeout is enforced here, so a
/// hanging script resolves to `JobError::Timeout` after `source.timeout()`.
#[derive(Clone, Default)]
pub struct MockRunner {
    scripts: Arc<Mutex<HashMap<String, ScriptedOutcome>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    gauge: ConcurrencyGauge,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, source_id: &str, outcome: ScriptedOutcome) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(source_id.into(), outcome);
        self
    }

    /// Make a scripted source take this long before resolving.
    pub fn delay(self, source_id: &str, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(source_id.into(), delay);
        self
    }

    pub fn gauge(&self) -> ConcurrencyGauge {
        self.gauge.clone()
    }
}

impl SourceRunner for MockRunner {
    async fn run(
        &self,
        source: &SourceDescriptor,
        _query: &str,
        _result_cap: usize,
    ) -> Result<RawPayload, JobError> {
        self.gauge.enter();
        let script = self.scripts.lock().unwrap().get(&source.id).cloned();
        let delay = self.delays.lock().unwrap().get(&source.id).copied();

        let behavior = async {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match script {
                Some(ScriptedOutcome::Payload(payload)) => Ok(payload),
                Some(ScriptedOutcome::Fail(err)) => Err(err),
                Some(ScriptedOutcome::Hang) => {
                    std::future::pending::<Result<RawPayload, JobError>>().await
                }
                Some(ScriptedOutcome::Panic) => panic!("scripted panic for {}", source.id),
                None => Err(JobError::worker_failure("no scripted outcome")),
            }
        };

        let outcome = match tokio::time::timeout(source.timeout(), behavior).await {
            Ok(result) => result,
            Err(_) => Err(JobError::Timeout {
                timeout_secs: source.timeout_secs,
            }),
        };
        self.gauge.exit();
        outcome
    }
}

// ---------------------------------------------------------------------------
// MockSuggester
// ---------------------------------------------------------------------------

/// Suggester returning fixed fragments, or a delegate error.
#[derive(Clone)]
pub struct MockSuggester {
    fragments: Arc<Mutex<Result<Vec<String>, String>>>,
}

impl MockSuggester {
    pub fn with_fragments(fragments: Vec<String>) -> Self {
        Self {
            fragments: Arc::new(Mutex::new(Ok(fragments))),
        }
    }

    pub fn with_error(message: &str) -> Self {
        Self {
            fragments: Arc::new(Mutex::new(Err(message.into()))),
        }
    }
}

impl FragmentSuggester for MockSuggester {
    async fn suggest_fragments(&self, _document_text: &str) -> Result<Vec<String>, HarvestError> {
        self.fragments
            .lock()
            .unwrap()
            .clone()
            .map_err(HarvestError::Delegate)
    }
}

// ---------------------------------------------------------------------------
// CollectingObserver
// ---------------------------------------------------------------------------

/// Owned snapshot of an observed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    HarvestStarted { total_sources: usize },
    SourceStarted { source_id: String },
    SourceCompleted { source_id: String, failed: bool },
    HarvestCompleted { unique: usize, duplicates: usize },
}

/// Observer that records every event for assertions.
#[derive(Clone, Default)]
pub struct CollectingObserver {
    pub events: Arc<Mutex<Vec<ObservedEvent>>>,
    pub last_counts: Arc<Mutex<RunningCounts>>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<ObservedEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressObserver for CollectingObserver {
    fn on_event(&self, event: HarvestEvent<'_>) {
        let observed = match event {
            HarvestEvent::HarvestStarted { total_sources, .. } => {
                ObservedEvent::HarvestStarted { total_sources }
            }
            HarvestEvent::SourceStarted { source_id } => ObservedEvent::SourceStarted {
                source_id: source_id.into(),
            },
            HarvestEvent::SourceCompleted {
                source_id,
                error,
                counts,
            } => {
                *self.last_counts.lock().unwrap() = counts;
                ObservedEvent::SourceCompleted {
                    source_id: source_id.into(),
                    failed: error.is_some(),
                }
            }
            HarvestEvent::HarvestCompleted { counts } => {
                *self.last_counts.lock().unwrap() = counts;
                ObservedEvent::HarvestCompleted {
                    unique: counts.unique,
                    duplicates: counts.duplicates,
                }
            }
        };
        self.events.lock().unwrap().push(observed);
    }
}
