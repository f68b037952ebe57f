//! Harvest scheduler: fans one query out to many source jobs under bounded
//! concurrency and merges the results through the dedup engine.
//!
//! One coordinating task drives everything. Jobs run on a
//! [`tokio::task::JoinSet`] behind a counting semaphore of
//! `max_concurrency` permits, with a stagger delay proportional to the
//! submission index so many external endpoints are not hit at once.
//! Completions are processed in completion order; dedup is applied serially
//! on the coordinator, so session state is never touched by two jobs at
//! once. A single source failure never aborts the harvest.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::artifact::ArtifactPolicy;
use crate::dedup::{DedupSession, Verdict};
use crate::error::{HarvestError, JobError};
use crate::job::Job;
use crate::models::{HarvestReport, HarvestRequest, JobResult, RawPayload, SourceDescriptor};
use crate::normalize::Normalizer;
use crate::progress::{HarvestEvent, ProgressObserver, RunningCounts};
use crate::traits::{FragmentSuggester, SourceRunner};

/// Scheduling knobs.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Maximum jobs holding an execution slot at once.
    pub max_concurrency: usize,
    /// Per-job stagger: job `i` waits `i * stagger_interval` before
    /// requesting a slot.
    pub stagger_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            stagger_interval: Duration::from_millis(500),
        }
    }
}

impl SchedulerConfig {
    /// Delay before job `index` requests an execution slot. Saturates
    /// instead of overflowing for absurdly large source lists.
    fn submission_delay(&self, index: usize, source_delay: Duration) -> Duration {
        let steps = u32::try_from(index).unwrap_or(u32::MAX);
        self.stagger_interval
            .saturating_mul(steps)
            .saturating_add(source_delay)
    }
}

/// Drives the runner → normalizer → dedup pipeline for one request.
pub struct HarvestScheduler<R, G>
where
    R: SourceRunner + 'static,
    G: FragmentSuggester,
{
    runner: R,
    normalizer: Normalizer<G>,
    artifact_policy: ArtifactPolicy,
    config: SchedulerConfig,
}

impl<R, G> HarvestScheduler<R, G>
where
    R: SourceRunner + 'static,
    G: FragmentSuggester,
{
    pub fn new(runner: R, normalizer: Normalizer<G>, config: SchedulerConfig) -> Self {
        Self {
            runner,
            normalizer,
            artifact_policy: ArtifactPolicy::default(),
            config,
        }
    }

    pub fn with_artifact_policy(mut self, policy: ArtifactPolicy) -> Self {
        self.artifact_policy = policy;
        self
    }

    /// Run one harvest round.
    ///
    /// Hard-errors only on a malformed request; per-job failures are
    /// recorded in the report. Every submitted source yields exactly one
    /// `JobResult`.
    pub async fn harvest<O: ProgressObserver>(
        &self,
        req: &HarvestRequest,
        session: &mut DedupSession,
        observer: &O,
    ) -> Result<HarvestReport, HarvestError> {
        req.validate()?;

        observer.on_event(HarvestEvent::HarvestStarted {
            query: &req.query,
            total_sources: req.sources.len(),
        });

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut tasks: JoinSet<(Job, Result<RawPayload, JobError>)> = JoinSet::new();
        let mut task_sources: HashMap<tokio::task::Id, String> = HashMap::new();

        for (index, source) in req.sources.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let runner = self.runner.clone();
            let delay = self.config.submission_delay(index, source.start_delay());
            let mut job = Job::new(source.clone(), &req.query, req.per_source_cap);
            let source_id = source.id.clone();

            observer.on_event(HarvestEvent::SourceStarted {
                source_id: &source_id,
            });

            let handle = tasks.spawn(async move {
                tokio::time::sleep(delay).await;
                let permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (job, Err(JobError::worker_failure("execution slot closed")));
                    }
                };
                job.mark_running();
                let outcome = runner.run(&job.source, &job.query, job.result_cap).await;
                drop(permit);
                (job, outcome)
            });
            task_sources.insert(handle.id(), source_id);
        }

        let mut report = HarvestReport::default();
        let mut counts = RunningCounts::default();

        while let Some(joined) = tasks.join_next_with_id().await {
            let result = match joined {
                Ok((id, (mut job, outcome))) => {
                    task_sources.remove(&id);
                    match outcome {
                        Ok(payload) => {
                            job.complete();
                            tracing::debug!(
                                job_id = %job.id,
                                source_id = %job.source.id,
                                status = %job.status,
                                "Job resolved"
                            );
                            self.process_success(&job.source, &payload, req.per_source_cap, session)
                                .await
                        }
                        Err(err) => {
                            job.fail(&err);
                            tracing::debug!(
                                job_id = %job.id,
                                source_id = %job.source.id,
                                status = %job.status,
                                "Job resolved"
                            );
                            JobResult::failed(job.source.id.clone(), err)
                        }
                    }
                }
                Err(join_err) => {
                    // A panicking runner still gets a result for its source.
                    let source_id = task_sources
                        .remove(&join_err.id())
                        .unwrap_or_else(|| "unknown".to_string());
                    tracing::error!(%source_id, error = %join_err, "Job task crashed");
                    JobResult::failed(
                        source_id,
                        JobError::worker_failure(format!("job task crashed: {join_err}")),
                    )
                }
            };

            counts.raw += result.raw_item_count;
            counts.duplicates += result.duplicate_count;
            counts.unique += result.unique_items.len();

            observer.on_event(HarvestEvent::SourceCompleted {
                source_id: &result.source_id,
                error: result.error.as_ref(),
                counts,
            });

            if result.success {
                report.succeeded_sources.push(result.source_id.clone());
            } else {
                report.failed_sources.push(result.source_id.clone());
            }
            report.total_raw += result.raw_item_count;
            report.total_duplicates_removed += result.duplicate_count;
            report.all_unique_items.extend(result.unique_items.clone());
            report.job_results.push(result);
        }

        observer.on_event(HarvestEvent::HarvestCompleted { counts });
        Ok(report)
    }

    async fn process_success(
        &self,
        source: &SourceDescriptor,
        payload: &RawPayload,
        cap: usize,
        session: &mut DedupSession,
    ) -> JobResult {
        let items = self.normalizer.normalize(payload, source, cap).await;
        let raw_item_count = items.len();

        let mut unique_items = Vec::new();
        let mut duplicate_count = 0;
        for item in items {
            match session.accept(&item.text) {
                Verdict::Unique => unique_items.push(item),
                Verdict::Duplicate => duplicate_count += 1,
            }
        }

        let artifact = first_preview(payload)
            .map(|encoded| self.artifact_policy.evaluate_base64(encoded))
            .filter(|artifact| artifact.valid);

        JobResult {
            source_id: source.id.clone(),
            success: true,
            error: None,
            raw_item_count,
            unique_items,
            duplicate_count,
            artifact,
        }
    }
}

fn first_preview(payload: &RawPayload) -> Option<&str> {
    let RawPayload::Surveys(batch) = payload;
    batch
        .surveys
        .iter()
        .find_map(|doc| doc.preview_image.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_delay_scales_with_index() {
        let config = SchedulerConfig {
            max_concurrency: 3,
            stagger_interval: Duration::from_millis(500),
        };
        assert_eq!(config.submission_delay(0, Duration::ZERO), Duration::ZERO);
        assert_eq!(
            config.submission_delay(3, Duration::from_millis(200)),
            Duration::from_millis(1700)
        );
    }

    #[test]
    fn test_submission_delay_saturates() {
        let config = SchedulerConfig {
            max_concurrency: 3,
            stagger_interval: Duration::from_secs(u64::MAX / 2),
        };
        // No panic; pathological indexes cap out instead of overflowing.
        assert_eq!(
            config.submission_delay(usize::MAX, Duration::from_secs(1)),
            Duration::MAX
        );
    }
}
