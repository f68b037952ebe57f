//! End-to-end scheduler scenarios with mock runners.

use std::time::Duration;

use pollharvest_core::dedup::{DedupConfig, DedupSession};
use pollharvest_core::error::JobError;
use pollharvest_core::models::{HarvestRequest, SourceDescriptor};
use pollharvest_core::normalize::{Normalizer, NormalizerConfig};
use pollharvest_core::scheduler::{HarvestScheduler, SchedulerConfig};
use pollharvest_core::testutil::{
    CollectingObserver, MockRunner, ObservedEvent, ScriptedOutcome, make_source, survey_payload,
    survey_payload_with_preview,
};
use pollharvest_core::traits::NullSuggester;

fn scheduler(runner: MockRunner, max_concurrency: usize) -> HarvestScheduler<MockRunner, NullSuggester> {
    let config = SchedulerConfig {
        max_concurrency,
        stagger_interval: Duration::from_millis(1),
    };
    HarvestScheduler::new(
        runner,
        Normalizer::new(NormalizerConfig::default(), NullSuggester),
        config,
    )
}

fn request(sources: Vec<SourceDescriptor>) -> HarvestRequest {
    HarvestRequest {
        query: "city budget".into(),
        sources,
        per_source_cap: 10,
    }
}

fn session() -> DedupSession {
    DedupSession::new(DedupConfig::default(), 5)
}

#[tokio::test]
async fn empty_source_list_is_a_hard_error() {
    let runner = MockRunner::new();
    let sched = scheduler(runner, 2);
    let mut session = session();
    let err = sched
        .harvest(&request(vec![]), &mut session, &CollectingObserver::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("empty source list"));
}

#[tokio::test]
async fn completeness_over_mixed_outcomes() {
    let runner = MockRunner::new()
        .script(
            "a",
            ScriptedOutcome::Payload(survey_payload(
                "A1",
                &["Do you approve of the mayor's record?"],
            )),
        )
        .script(
            "b",
            ScriptedOutcome::Fail(JobError::worker_failure("exit code 2")),
        )
        .script(
            "c",
            ScriptedOutcome::Fail(JobError::malformed_output("not json")),
        )
        .script("d", ScriptedOutcome::Panic);

    let sched = scheduler(runner, 2);
    let mut session = session();
    let req = request(vec![
        make_source("a"),
        make_source("b"),
        make_source("c"),
        make_source("d"),
    ]);
    let report = sched
        .harvest(&req, &mut session, &CollectingObserver::new())
        .await
        .unwrap();

    assert_eq!(report.total_sources(), 4);
    assert_eq!(report.succeeded_sources, vec!["a".to_string()]);
    assert_eq!(report.failed_sources.len(), 3);
    assert!(report.failed_sources.contains(&"d".to_string()));
    assert_eq!(report.job_results.len(), 4);
}

#[tokio::test]
async fn bounded_concurrency_never_exceeds_pool_size() {
    let mut runner = MockRunner::new();
    let mut sources = Vec::new();
    for i in 0..8 {
        let id = format!("s{i}");
        runner = runner
            .script(
                &id,
                ScriptedOutcome::Payload(survey_payload(
                    &id.to_uppercase(),
                    &[&format!("Do you approve of proposal number {i} this year?")],
                )),
            )
            .delay(&id, Duration::from_millis(30));
        sources.push(make_source(&id));
    }
    let gauge = runner.gauge();

    let sched = scheduler(runner, 2);
    let mut session = session();
    let report = sched
        .harvest(&request(sources), &mut session, &CollectingObserver::new())
        .await
        .unwrap();

    assert_eq!(report.total_sources(), 8);
    assert!(
        gauge.max_observed() <= 2,
        "observed {} concurrent jobs with pool size 2",
        gauge.max_observed()
    );
}

#[tokio::test]
async fn timeout_resolves_within_deadline_and_leaks_nothing() {
    let runner = MockRunner::new().script("slow", ScriptedOutcome::Hang);
    let sched = scheduler(runner, 1);

    let mut source = make_source("slow");
    source.timeout_secs = 1;

    let mut session = session();
    let start = std::time::Instant::now();
    let report = sched
        .harvest(
            &request(vec![source]),
            &mut session,
            &CollectingObserver::new(),
        )
        .await
        .unwrap();

    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(report.failed_sources, vec!["slow".to_string()]);
    assert!(report.all_unique_items.is_empty());
    let result = &report.job_results[0];
    assert!(matches!(result.error, Some(JobError::Timeout { .. })));
}

#[tokio::test]
async fn end_to_end_dedup_across_sources() {
    // A: 4 items, 2 of them near-duplicates of each other.
    // B: times out. C: 3 unique items.
    let runner = MockRunner::new()
        .script(
            "a",
            ScriptedOutcome::Payload(survey_payload(
                "A1",
                &[
                    "How satisfied are you with the service?",
                    "How satisfied are you with the service you received?",
                    "Do you approve of the governor's budget plan?",
                    "Should the city expand the light rail network?",
                ],
            )),
        )
        .script("b", ScriptedOutcome::Hang)
        .script(
            "c",
            ScriptedOutcome::Payload(survey_payload(
                "C1",
                &[
                    "What is your age and occupation?",
                    "Which party did you vote for in the last election?",
                    "Do you trust local election officials?",
                ],
            )),
        );

    let sched = scheduler(runner, 2);
    let mut b = make_source("b");
    b.timeout_secs = 1;
    let req = request(vec![make_source("a"), b, make_source("c")]);

    let observer = CollectingObserver::new();
    let mut session = session();
    let report = sched.harvest(&req, &mut session, &observer).await.unwrap();

    let mut succeeded = report.succeeded_sources.clone();
    succeeded.sort();
    assert_eq!(succeeded, vec!["a".to_string(), "c".to_string()]);
    assert_eq!(report.failed_sources, vec!["b".to_string()]);
    assert_eq!(report.all_unique_items.len(), 6);
    assert_eq!(report.total_duplicates_removed, 1);
    assert_eq!(report.total_raw, 7);

    // Dedup scope is the whole session: no assertion on which of the two
    // near-duplicate wordings survived, only on the counts.
    let counts = *observer.last_counts.lock().unwrap();
    assert_eq!(counts.unique, 6);
    assert_eq!(counts.duplicates, 1);
}

#[tokio::test]
async fn session_memory_filters_repeat_rounds() {
    let payload = survey_payload("A1", &["Do you approve of the mayor's record?"]);
    let runner = MockRunner::new().script("a", ScriptedOutcome::Payload(payload));
    let sched = scheduler(runner, 1);
    let req = request(vec![make_source("a")]);

    let mut session = session();
    session.begin_round().unwrap();
    let first = sched
        .harvest(&req, &mut session, &CollectingObserver::new())
        .await
        .unwrap();
    assert_eq!(first.all_unique_items.len(), 1);

    // Same source again, same session: everything is already seen.
    session.begin_round().unwrap();
    let second = sched
        .harvest(&req, &mut session, &CollectingObserver::new())
        .await
        .unwrap();
    assert_eq!(second.all_unique_items.len(), 0);
    assert_eq!(second.total_duplicates_removed, 1);

    // A brand-new session accepts the items again.
    let mut fresh = DedupSession::new(DedupConfig::default(), 5);
    let third = sched
        .harvest(&req, &mut fresh, &CollectingObserver::new())
        .await
        .unwrap();
    assert_eq!(third.all_unique_items.len(), 1);
}

#[tokio::test]
async fn preview_artifact_attached_only_when_valid() {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD as BASE64;

    // A real capture: large and byte-diverse. A blank capture: large but
    // uniform, so it fails the diversity check and must be dropped.
    let diverse: Vec<u8> = (0..12 * 1024).map(|i| (i % 251) as u8).collect();
    let good_preview = BASE64.encode(&diverse);
    let blank_preview = BASE64.encode(vec![0u8; 8 * 1024]);

    let runner = MockRunner::new()
        .script(
            "rich",
            ScriptedOutcome::Payload(survey_payload_with_preview(
                "R1",
                &["Do you approve of the mayor's record?"],
                &good_preview,
            )),
        )
        .script(
            "blank",
            ScriptedOutcome::Payload(survey_payload_with_preview(
                "B1",
                &["Do you support the proposed transit expansion?"],
                &blank_preview,
            )),
        )
        .script(
            "bare",
            ScriptedOutcome::Payload(survey_payload(
                "N1",
                &["Should the city expand the light rail network?"],
            )),
        );

    let sched = scheduler(runner, 3);
    let mut session = session();
    let req = request(vec![
        make_source("rich"),
        make_source("blank"),
        make_source("bare"),
    ]);
    let report = sched
        .harvest(&req, &mut session, &CollectingObserver::new())
        .await
        .unwrap();

    let result_for = |id: &str| {
        report
            .job_results
            .iter()
            .find(|r| r.source_id == id)
            .unwrap()
    };

    let artifact = result_for("rich").artifact.expect("valid preview kept");
    assert!(artifact.valid);
    assert_eq!(artifact.size_bytes, good_preview.len());

    assert!(result_for("blank").artifact.is_none());
    assert!(result_for("bare").artifact.is_none());
}

#[tokio::test]
async fn progress_events_are_emitted_in_order() {
    let runner = MockRunner::new().script(
        "a",
        ScriptedOutcome::Payload(survey_payload(
            "A1",
            &["Do you approve of the mayor's record?"],
        )),
    );
    let sched = scheduler(runner, 1);
    let observer = CollectingObserver::new();
    let mut session = session();
    sched
        .harvest(&request(vec![make_source("a")]), &mut session, &observer)
        .await
        .unwrap();

    let events = observer.snapshot();
    assert_eq!(events[0], ObservedEvent::HarvestStarted { total_sources: 1 });
    assert_eq!(
        events[1],
        ObservedEvent::SourceStarted {
            source_id: "a".into()
        }
    );
    assert_eq!(
        events[2],
        ObservedEvent::SourceCompleted {
            source_id: "a".into(),
            failed: false
        }
    );
    assert_eq!(
        events[3],
        ObservedEvent::HarvestCompleted {
            unique: 1,
            duplicates: 0
        }
    );
}
