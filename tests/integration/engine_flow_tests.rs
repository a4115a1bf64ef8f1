//! End-to-end engine flows against the mock agent: baseline
//! transactions, nested spans, ignore semantics, URI filtering, tagging,
//! and the synchronous variants.

use std::time::Duration;

use serde_json::json;
use tokio::sync::broadcast;

use scout_apm::protocol::ApiRequest;
use scout_apm::{Config, Engine, EngineEvent, EngineOptions};

use super::mock_agent::MockAgent;

/// Register + application metadata, always sent by setup before any
/// request telemetry.
const SETUP_MESSAGES: usize = 2;

async fn ready_engine(mock: &MockAgent) -> Engine {
    let config = Config::new();
    config.set("name", "demo").expect("set");
    config.set("key", "K").expect("set");
    config.set("monitor", true).expect("set");
    config.set("coreAgentLaunch", false).expect("set");
    config.set("socketPath", mock.socket_path()).expect("set");

    let engine = Engine::new(config, EngineOptions::default());
    engine.setup().await.expect("setup must succeed");
    engine
}

/// Receive events until one matches, panicking after two seconds.
async fn expect_event<F>(rx: &mut broadcast::Receiver<EngineEvent>, mut matches: F) -> EngineEvent
where
    F: FnMut(&EngineEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let remaining = deadline
            .checked_duration_since(tokio::time::Instant::now())
            .expect("timed out waiting for engine event");
        let event = tokio::time::timeout(remaining, rx.recv())
            .await
            .expect("timed out waiting for engine event")
            .expect("event channel must stay open");
        if matches(&event) {
            return event;
        }
    }
}

// ── Baseline transaction ─────────────────────────────────────────────────────

#[tokio::test]
async fn baseline_transaction_emits_the_expected_wire_sequence() {
    let mock = MockAgent::spawn().await;
    let engine = ready_engine(&mock).await;

    engine
        .transaction("T", |_request| async {})
        .await
        .expect("transaction must succeed");

    let seen = mock.wait_for(SETUP_MESSAGES + 2).await;

    match &seen[0] {
        ApiRequest::Register {
            app,
            key,
            api_version,
        } => {
            assert_eq!(app, "demo");
            assert_eq!(key, "K");
            assert_eq!(api_version, "1.0");
        }
        other => panic!("first message must be Register, got: {other:?}"),
    }

    match &seen[1] {
        ApiRequest::ApplicationEvent { event_type, .. } => {
            assert_eq!(event_type, "scout.metadata");
        }
        other => panic!("second message must be the metadata event, got: {other:?}"),
    }

    let (start_id, start_ts) = match &seen[2] {
        ApiRequest::StartRequest {
            request_id,
            timestamp,
        } => (request_id.clone(), timestamp.clone()),
        other => panic!("expected StartRequest, got: {other:?}"),
    };
    assert!(start_id.starts_with("req-"), "got: {start_id}");

    match &seen[3] {
        ApiRequest::FinishRequest {
            request_id,
            timestamp,
        } => {
            assert_eq!(*request_id, start_id);
            // ISO-8601 UTC timestamps sort lexicographically.
            assert!(*timestamp >= start_ts, "finish must not precede start");
        }
        other => panic!("expected FinishRequest, got: {other:?}"),
    }
}

// ── Nested spans ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn nested_instruments_record_parentage_and_ordering() {
    let mock = MockAgent::spawn().await;
    let engine = ready_engine(&mock).await;

    let outer_engine = engine.clone();
    engine
        .transaction("T", move |_request| {
            let inner_engine = outer_engine.clone();
            async move {
                let innermost = inner_engine.clone();
                inner_engine
                    .instrument("outer", move |_span| async move {
                        innermost
                            .instrument("inner", |_span| async {})
                            .await
                            .expect("inner instrument");
                    })
                    .await
                    .expect("outer instrument");
            }
        })
        .await
        .expect("transaction must succeed");

    let seen = mock.wait_for(SETUP_MESSAGES + 6).await;
    let telemetry = &seen[SETUP_MESSAGES..];

    assert!(
        matches!(telemetry[0], ApiRequest::StartRequest { .. }),
        "telemetry must open with StartRequest"
    );
    assert!(
        matches!(telemetry[telemetry.len() - 1], ApiRequest::FinishRequest { .. }),
        "FinishRequest must be the last message"
    );

    let mut outer: Option<(String, Option<String>)> = None;
    let mut inner: Option<(String, Option<String>)> = None;
    let mut stop_count = 0;
    for message in telemetry {
        match message {
            ApiRequest::StartSpan {
                span_id,
                parent_id,
                operation,
                ..
            } => {
                let record = (span_id.clone(), parent_id.clone());
                match operation.as_str() {
                    "outer" => outer = Some(record),
                    "inner" => inner = Some(record),
                    other => panic!("unexpected span operation: {other}"),
                }
            }
            ApiRequest::StopSpan { .. } => stop_count += 1,
            _ => {}
        }
    }

    let (outer_id, outer_parent) = outer.expect("outer span must be on the wire");
    let (_, inner_parent) = inner.expect("inner span must be on the wire");
    assert_eq!(outer_parent, None, "outer span parents the request");
    assert_eq!(
        inner_parent.as_deref(),
        Some(outer_id.as_str()),
        "inner span must parent the outer span"
    );
    assert_eq!(stop_count, 2, "every StartSpan needs its StopSpan");
}

#[tokio::test]
async fn instrument_without_a_transaction_creates_one() {
    let mock = MockAgent::spawn().await;
    let engine = ready_engine(&mock).await;

    engine
        .instrument("orphan", |_span| async {})
        .await
        .expect("instrument must succeed");

    let seen = mock.wait_for(SETUP_MESSAGES + 4).await;
    let kinds: Vec<&str> = seen[SETUP_MESSAGES..].iter().map(ApiRequest::kind).collect();
    assert_eq!(
        kinds,
        vec!["StartRequest", "StartSpan", "StopSpan", "FinishRequest"],
        "exactly one auto-created request must wrap the span"
    );
}

// ── Ignore semantics ─────────────────────────────────────────────────────────

#[tokio::test]
async fn ignores_path_matches_configured_prefixes() {
    let mock = MockAgent::spawn().await;
    let engine = ready_engine(&mock).await;
    engine
        .config()
        .set("ignore", vec!["/health".to_owned()])
        .expect("set");

    let mut events = engine.subscribe();

    assert!(engine.ignores_path("/health/live"));
    assert!(!engine.ignores_path("/api"));

    expect_event(&mut events, |event| {
        matches!(event, EngineEvent::IgnoredPathDetected { path } if path == "/health/live")
    })
    .await;
}

#[tokio::test]
async fn ignored_requests_emit_no_telemetry() {
    let mock = MockAgent::spawn().await;
    let engine = ready_engine(&mock).await;
    let mut events = engine.subscribe();

    engine
        .transaction("T", |request| async move {
            request.set_ignored(true);
        })
        .await
        .expect("transaction must succeed");

    expect_event(&mut events, |event| {
        matches!(event, EngineEvent::IgnoredRequestProcessingSkipped { .. })
    })
    .await;

    // Give any stray telemetry time to arrive, then assert silence.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        mock.requests().len(),
        SETUP_MESSAGES,
        "an ignored request must emit nothing beyond setup traffic"
    );
}

// ── URI filtering ────────────────────────────────────────────────────────────

#[tokio::test]
async fn filter_request_path_dispatches_on_uri_reporting() {
    let config = Config::new();
    let engine = Engine::new(config, EngineOptions::default());

    // Default level filters parameter values.
    assert_eq!(
        engine.filter_request_path("/users/42?token=abc"),
        "/users/42?token=[FILTERED]"
    );

    engine.config().set("uriReporting", "path").expect("set");
    assert_eq!(engine.filter_request_path("/users/42?token=abc"), "/users/42");

    engine.config().set("uriReporting", "none").expect("set");
    assert_eq!(
        engine.filter_request_path("/users/42?token=abc"),
        "/users/42?token=abc"
    );
}

// ── Tagging ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_context_tags_the_request_and_span() {
    let mock = MockAgent::spawn().await;
    let engine = ready_engine(&mock).await;

    let tagger = engine.clone();
    engine
        .transaction("T", move |_request| {
            let engine = tagger.clone();
            async move {
                engine.add_context("user", json!("alice"), None);
                let span_tagger = engine.clone();
                engine
                    .instrument("db", move |_span| async move {
                        span_tagger.add_context("query", json!("select 1"), None);
                    })
                    .await
                    .expect("instrument");
            }
        })
        .await
        .expect("transaction must succeed");

    let seen = mock.wait_for(SETUP_MESSAGES + 6).await;

    let request_tag = seen.iter().find_map(|m| match m {
        ApiRequest::TagRequest { tag, value, .. } => Some((tag.clone(), value.clone())),
        _ => None,
    });
    assert_eq!(
        request_tag,
        Some(("user".to_owned(), json!("alice"))),
        "the request-level tag must flush as TagRequest"
    );

    let span_tag = seen.iter().find_map(|m| match m {
        ApiRequest::TagSpan { tag, value, .. } => Some((tag.clone(), value.clone())),
        _ => None,
    });
    assert_eq!(
        span_tag,
        Some(("query".to_owned(), json!("select 1"))),
        "the span-level tag must flush as TagSpan"
    );
}

// ── Synchronous variants ─────────────────────────────────────────────────────

#[tokio::test]
async fn transaction_sync_flushes_like_the_async_variant() {
    let mock = MockAgent::spawn().await;
    let engine = ready_engine(&mock).await;

    let value = engine
        .transaction_sync("T", |request| {
            assert!(request.id().starts_with("req-"));
            42
        })
        .expect("sync transaction must succeed");
    assert_eq!(value, 42);

    let seen = mock.wait_for(SETUP_MESSAGES + 2).await;
    let kinds: Vec<&str> = seen[SETUP_MESSAGES..].iter().map(ApiRequest::kind).collect();
    assert_eq!(kinds, vec!["StartRequest", "FinishRequest"]);
}

#[tokio::test]
async fn instrument_sync_without_a_parent_creates_a_transaction() {
    let mock = MockAgent::spawn().await;
    let engine = ready_engine(&mock).await;

    engine
        .instrument_sync("orphan", |span| assert_eq!(span.operation(), "orphan"), None)
        .expect("sync instrument must succeed");

    let seen = mock.wait_for(SETUP_MESSAGES + 4).await;
    let kinds: Vec<&str> = seen[SETUP_MESSAGES..].iter().map(ApiRequest::kind).collect();
    assert_eq!(
        kinds,
        vec!["StartRequest", "StartSpan", "StopSpan", "FinishRequest"]
    );
}

#[tokio::test]
async fn instrument_sync_nests_under_the_sync_transaction() {
    let mock = MockAgent::spawn().await;
    let engine = ready_engine(&mock).await;

    let inner = engine.clone();
    engine
        .transaction_sync("T", move |_request| {
            inner
                .instrument_sync("step", |_span| (), None)
                .expect("sync instrument");
        })
        .expect("sync transaction must succeed");

    let seen = mock.wait_for(SETUP_MESSAGES + 4).await;
    let telemetry = &seen[SETUP_MESSAGES..];
    assert!(matches!(telemetry[0], ApiRequest::StartRequest { .. }));
    assert!(
        matches!(
            &telemetry[1],
            ApiRequest::StartSpan { parent_id: None, operation, .. } if operation == "step"
        ),
        "the span must attach directly to the sync request, got: {:?}",
        telemetry[1]
    );
    assert!(matches!(telemetry[3], ApiRequest::FinishRequest { .. }));
}

// ── Monitor gate ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn monitor_false_suppresses_request_telemetry() {
    let mock = MockAgent::spawn().await;

    let config = Config::new();
    config.set("name", "demo").expect("set");
    config.set("key", "K").expect("set");
    config.set("coreAgentLaunch", false).expect("set");
    config.set("socketPath", mock.socket_path()).expect("set");
    // monitor stays at its default: false.

    let engine = Engine::new(config, EngineOptions::default());
    engine.setup().await.expect("setup must succeed");

    engine
        .transaction("T", |_request| async {})
        .await
        .expect("transaction must succeed even while muted");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        mock.requests().len(),
        SETUP_MESSAGES,
        "request telemetry must be swallowed when monitor is off"
    );
}
