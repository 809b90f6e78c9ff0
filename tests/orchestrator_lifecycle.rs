//! Lifecycle properties of the generation orchestrator: progress
//! monotonicity, supersede isolation, reset semantics, and the error
//! taxonomy observed by subscribers.

use draftgen::client::GenerationClient;
use draftgen::error::{AiError, ErrorKind};
use draftgen::orchestrator::{GenerationEvent, GenerationOrchestrator, GenerationPhase};
use draftgen::template::{builtin_registry, ParamBag, ParamValue};
use draftgen::testing::{EventCollector, MockBackend};
use std::sync::Arc;
use std::time::Duration;

fn orchestrator(backend: MockBackend) -> GenerationOrchestrator {
    let client = GenerationClient::new(Arc::new(builtin_registry()), Arc::new(backend));
    GenerationOrchestrator::new(Arc::new(client))
}

fn abstract_params() -> ParamBag {
    let mut bag = ParamBag::new();
    bag.insert("topic".to_string(), ParamValue::from("urban heat islands"));
    bag.insert(
        "findings".to_string(),
        ParamValue::from("tree cover lowers peak temperatures"),
    );
    bag
}

async fn settle(orchestrator: &GenerationOrchestrator) {
    for _ in 0..200 {
        match orchestrator.phase() {
            GenerationPhase::Succeeded | GenerationPhase::Failed => return,
            _ => tokio::time::sleep(Duration::from_millis(5)).await,
        }
    }
    panic!("orchestrator never settled");
}

fn chunk_progress(events: &[GenerationEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|event| match event {
            GenerationEvent::ChunkReceived { progress, .. } => Some(*progress),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn progress_is_non_decreasing_and_ends_at_100_on_success() {
    let backend = MockBackend::new().with_fragments(vec![
        ("a", Some(10)),
        ("b", None),
        ("c", Some(20)),
        ("d", None),
        ("e", Some(95)),
    ]);
    let orch = orchestrator(backend);
    let collector = EventCollector::new();
    orch.subscribe(collector.subscriber());

    orch.start("abstract-concise", abstract_params(), true);
    settle(&orch).await;

    let progress = chunk_progress(&collector.events());
    assert_eq!(progress.len(), 5);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
    assert_eq!(*progress.last().unwrap(), 100);
    assert_eq!(orch.snapshot().progress, 100);
}

#[tokio::test]
async fn terminal_event_fires_after_all_chunk_events() {
    let backend = MockBackend::new().with_stream_failure(
        vec![("partial ", Some(40)), ("text", Some(60))],
        AiError::server("backend crashed mid-stream"),
    );
    let orch = orchestrator(backend);
    let collector = EventCollector::new();
    orch.subscribe(collector.subscriber());

    orch.start("abstract-concise", abstract_params(), true);
    settle(&orch).await;

    let events = collector.events();
    let terminal_index = events
        .iter()
        .position(GenerationEvent::is_terminal)
        .expect("no terminal event");
    assert_eq!(terminal_index, events.len() - 1);
    assert_eq!(chunk_progress(&events).len(), 2);

    let state = orch.snapshot();
    assert_eq!(state.phase, GenerationPhase::Failed);
    assert_eq!(state.error.unwrap().kind, ErrorKind::Server);
    // Partial content accumulated before the failure is retained
    assert_eq!(state.content, "partial text");
}

#[tokio::test]
async fn superseding_start_leaves_exactly_one_live_state_machine() {
    let backend = MockBackend::new()
        .with_delayed_response("stale", Duration::from_millis(80))
        .with_response("fresh");
    let orch = orchestrator(backend);
    let collector = EventCollector::new();
    orch.subscribe(collector.subscriber());

    orch.start("abstract-concise", abstract_params(), false);
    orch.start("abstract-concise", abstract_params(), false);
    settle(&orch).await;
    tokio::time::sleep(Duration::from_millis(140)).await;

    // The superseded call's outcome never mutated the newest state
    assert_eq!(orch.snapshot().content, "fresh");
    let terminal_count = collector
        .events()
        .iter()
        .filter(|event| event.is_terminal())
        .count();
    assert_eq!(terminal_count, 1);
}

#[tokio::test]
async fn chunks_from_superseded_streaming_call_never_reach_state() {
    let backend = MockBackend::new()
        .with_fragments_delayed(
            vec![("stale ", Some(40)), ("chunks", Some(80))],
            Duration::from_millis(60),
        )
        .with_response("fresh");
    let orch = orchestrator(backend);
    let collector = EventCollector::new();
    orch.subscribe(collector.subscriber());

    orch.start("abstract-concise", abstract_params(), true);
    orch.start("abstract-concise", abstract_params(), false);
    settle(&orch).await;
    tokio::time::sleep(Duration::from_millis(140)).await;

    let state = orch.snapshot();
    assert_eq!(state.phase, GenerationPhase::Succeeded);
    assert_eq!(state.content, "fresh");
    assert_eq!(state.progress, 100);

    // The stale stream's fragments arrived after the supersede; none of them
    // surfaced as events or touched the newest state
    let events = collector.events();
    assert!(chunk_progress(&events).is_empty(), "{events:?}");
    assert!(!state.content.contains("stale"));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn failure_from_superseded_call_never_surfaces() {
    let backend = MockBackend::new()
        .with_delayed_failure(AiError::server("stale failure"), Duration::from_millis(60))
        .with_response("fresh");
    let orch = orchestrator(backend);
    let collector = EventCollector::new();
    orch.subscribe(collector.subscriber());

    orch.start("abstract-concise", abstract_params(), false);
    orch.start("abstract-concise", abstract_params(), false);
    settle(&orch).await;
    tokio::time::sleep(Duration::from_millis(140)).await;

    let state = orch.snapshot();
    assert_eq!(state.phase, GenerationPhase::Succeeded);
    assert!(state.error.is_none());
    assert!(!collector
        .events()
        .iter()
        .any(|e| matches!(e, GenerationEvent::Failed { .. })));
}

#[tokio::test]
async fn reset_from_every_phase_yields_clean_idle() {
    // From idle
    let orch = orchestrator(MockBackend::new());
    orch.reset();
    let state = orch.snapshot();
    assert_eq!(state.phase, GenerationPhase::Idle);

    // From in-flight
    let orch = orchestrator(
        MockBackend::new().with_delayed_response("late", Duration::from_millis(60)),
    );
    orch.start("abstract-concise", abstract_params(), false);
    orch.reset();
    let state = orch.snapshot();
    assert_eq!(state.phase, GenerationPhase::Idle);
    assert_eq!(state.progress, 0);
    assert!(state.content.is_empty());
    assert!(state.error.is_none());

    // From failed
    let orch = orchestrator(MockBackend::new().with_failure(AiError::server("boom")));
    orch.start("abstract-concise", abstract_params(), false);
    settle(&orch).await;
    orch.reset();
    let state = orch.snapshot();
    assert_eq!(state.phase, GenerationPhase::Idle);
    assert!(state.error.is_none());

    // From succeeded
    let orch = orchestrator(MockBackend::new().with_response("done"));
    orch.start("abstract-concise", abstract_params(), false);
    settle(&orch).await;
    orch.reset();
    let state = orch.snapshot();
    assert_eq!(state.phase, GenerationPhase::Idle);
    assert!(state.content.is_empty());
    assert!(state.content_id.is_none());
}

#[tokio::test]
async fn every_surfaced_error_carries_a_taxonomy_kind() {
    let cases = vec![
        (AiError::network("offline"), ErrorKind::Network, false),
        (AiError::rate_limit("slow down"), ErrorKind::RateLimit, true),
        (AiError::server("boom"), ErrorKind::Server, true),
        (AiError::validation("bad"), ErrorKind::Validation, false),
        (AiError::unknown("???"), ErrorKind::Unknown, false),
    ];

    for (error, expected_kind, expected_retryable) in cases {
        let orch = orchestrator(MockBackend::new().with_failure(error));
        orch.start("abstract-concise", abstract_params(), false);
        settle(&orch).await;

        let surfaced = orch.snapshot().error.expect("error missing");
        assert_eq!(surfaced.kind, expected_kind);
        assert_eq!(surfaced.retryable(), expected_retryable);
    }
}

#[tokio::test]
async fn template_resolution_failure_reaches_subscribers_as_validation() {
    let backend = MockBackend::new().with_response("unreachable");
    let counters = backend.counters();
    let orch = orchestrator(backend);
    let collector = EventCollector::new();
    orch.subscribe(collector.subscriber());

    orch.start("no-such-template", ParamBag::new(), false);
    settle(&orch).await;

    let state = orch.snapshot();
    assert_eq!(state.phase, GenerationPhase::Failed);
    assert_eq!(state.error.unwrap().kind, ErrorKind::Validation);
    assert_eq!(counters.total_calls(), 0);
}

#[test]
fn resolver_is_deterministic_for_identical_inputs() {
    let registry = builtin_registry();
    let bag = abstract_params();
    let first = registry.resolve("abstract-concise", &bag).unwrap();
    for _ in 0..10 {
        assert_eq!(registry.resolve("abstract-concise", &bag).unwrap(), first);
    }

    let err = registry.resolve("unknown-template", &bag).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}
