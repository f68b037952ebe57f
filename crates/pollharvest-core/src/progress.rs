//! Progress reporting for harvest runs.
//!
//! The scheduler invokes the observer synchronously at well-defined points
//! (harvest start, job submission, job completion, harvest completion).
//! No implicit re-entrancy: observers are plain callbacks on the
//! coordinating task.

use crate::error::JobError;

/// Running totals across all jobs processed so far in one harvest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningCounts {
    pub unique: usize,
    pub raw: usize,
    pub duplicates: usize,
}

/// Events emitted by the scheduler for monitoring/logging.
#[derive(Debug, Clone)]
pub enum HarvestEvent<'a> {
    HarvestStarted {
        query: &'a str,
        total_sources: usize,
    },
    SourceStarted {
        source_id: &'a str,
    },
    SourceCompleted {
        source_id: &'a str,
        error: Option<&'a JobError>,
        counts: RunningCounts,
    },
    HarvestCompleted {
        counts: RunningCounts,
    },
}

/// Trait for receiving harvest events (decoupled logging).
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: HarvestEvent<'_>) {
        let _ = event;
    }
}

/// Observer that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl ProgressObserver for SilentObserver {}

/// Observer that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_event(&self, event: HarvestEvent<'_>) {
        match event {
            HarvestEvent::HarvestStarted {
                query,
                total_sources,
            } => {
                tracing::info!(%query, %total_sources, "Harvest started");
            }
            HarvestEvent::SourceStarted { source_id } => {
                tracing::info!(%source_id, "Source submitted");
            }
            HarvestEvent::SourceCompleted {
                source_id,
                error,
                counts,
            } => match error {
                Some(err) => {
                    tracing::warn!(
                        %source_id,
                        category = err.category(),
                        %err,
                        unique = counts.unique,
                        raw = counts.raw,
                        duplicates = counts.duplicates,
                        "Source failed"
                    );
                }
                None => {
                    tracing::info!(
                        %source_id,
                        unique = counts.unique,
                        raw = counts.raw,
                        duplicates = counts.duplicates,
                        "Source completed"
                    );
                }
            },
            HarvestEvent::HarvestCompleted { counts } => {
                tracing::info!(
                    unique = counts.unique,
                    raw = counts.raw,
                    duplicates = counts.duplicates,
                    "Harvest completed"
                );
            }
        }
    }
}
