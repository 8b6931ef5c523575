//! End-to-end behaviour of transport -> decoder -> engine -> publisher, driven
//! through the connection controller with scripted transports.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{stream, StreamExt};

use lib_sentiment::ingestors::decode_records;
use lib_sentiment::model::Trend;
use lib_sentiment::platform::NoopWidgetSink;
use lib_sentiment::{
    ByteStream, Category, ConnectionState, Lookbacks, SessionFlag, StreamError, StreamResult,
    TranscriptTransport,
};
use project_tests::{
    calm_frame, controller, controller_with, delta_frame, publisher, sentiment_frame, wait_for_status,
    wait_for_value,
    RecordingWidgetSink, Script, ScriptedTransport, WidgetCall, HEARTBEAT_FRAME, TEST_RECONNECT_DELAY,
};

#[tokio::test]
async fn clamping_scenario_over_the_wire() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    let ctrl = controller(transport);

    ctrl.connect();
    wait_for_status(&ctrl, |s| s.is_connected()).await;

    feed.unbounded_send(Ok(Bytes::from(calm_frame(15.0)))).unwrap();
    wait_for_value(&ctrl, Category::Calm, 45.0).await;
    assert_eq!(ctrl.publisher().history(Category::Calm, 20), vec![30.0, 45.0]);

    feed.unbounded_send(Ok(Bytes::from(calm_frame(80.0)))).unwrap();
    wait_for_value(&ctrl, Category::Calm, 100.0).await;

    feed.unbounded_send(Ok(Bytes::from(calm_frame(-150.0)))).unwrap();
    wait_for_value(&ctrl, Category::Calm, 0.0).await;

    // Untouched categories stay at the baseline.
    assert_eq!(ctrl.publisher().current_value(Category::Focused), 30.0);
}

#[tokio::test]
async fn heartbeats_and_malformed_frames_do_not_change_state() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    let ctrl = controller(transport);

    ctrl.connect();
    wait_for_status(&ctrl, |s| s.is_connected()).await;

    feed.unbounded_send(Ok(Bytes::from(calm_frame(5.0)))).unwrap();
    feed.unbounded_send(Ok(Bytes::from_static(HEARTBEAT_FRAME.as_bytes()))).unwrap();
    feed.unbounded_send(Ok(Bytes::from_static(b"data: {\"timestamp\": \"x\", \"sentiment\": {\"calm\": 1}}\n\n")))
        .unwrap();
    feed.unbounded_send(Ok(Bytes::from_static(b"data: }}}\n\n"))).unwrap();
    feed.unbounded_send(Ok(Bytes::from(calm_frame(1.0)))).unwrap();
    wait_for_value(&ctrl, Category::Calm, 36.0).await;

    let snapshot = ctrl.publisher().snapshot();
    assert_eq!(snapshot.updates_applied, 2);
    assert_eq!(snapshot.full_history(Category::Calm), &[30.0, 35.0, 36.0]);

    let stats = ctrl.decoder_stats();
    assert_eq!(stats.heartbeats, 1);
    assert_eq!(stats.decode_failures, 2);
    assert_eq!(stats.records, 2);
    assert!(ctrl.is_connected());
}

#[tokio::test]
async fn frames_split_across_chunks_apply_once() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    let ctrl = controller(transport);

    ctrl.connect();
    wait_for_status(&ctrl, |s| s.is_connected()).await;

    let body = format!("{}{}", calm_frame(3.0), calm_frame(4.0));
    for piece in body.as_bytes().chunks(11) {
        feed.unbounded_send(Ok(Bytes::copy_from_slice(piece))).unwrap();
    }
    wait_for_value(&ctrl, Category::Calm, 37.0).await;
    assert_eq!(ctrl.publisher().snapshot().updates_applied, 2);
}

#[tokio::test]
async fn history_stays_bounded_over_a_long_session() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    let ctrl = controller(transport);

    ctrl.connect();
    wait_for_status(&ctrl, |s| s.is_connected()).await;

    for _ in 0..52 {
        feed.unbounded_send(Ok(Bytes::from(calm_frame(0.0)))).unwrap();
    }
    let mut latest = ctrl.publisher().subscribe_latest();
    tokio::time::timeout(Duration::from_secs(5), latest.wait_for(|s| s.updates_applied == 52))
        .await
        .unwrap()
        .unwrap();

    let snapshot = ctrl.publisher().snapshot();
    for category in Category::ALL {
        assert_eq!(snapshot.full_history(category).len(), 50);
    }
    assert_eq!(ctrl.publisher().recent_history(Category::Calm).len(), 20);
}

#[tokio::test]
async fn double_connect_makes_one_transport_attempt() {
    let transport = ScriptedTransport::new();
    let _feed = transport.push_stream();
    let ctrl = controller(transport.clone());

    ctrl.connect();
    ctrl.connect();
    wait_for_status(&ctrl, |s| s.is_connected()).await;
    ctrl.connect();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(transport.opens(), 1);
    assert_eq!(ctrl.status().attempts, 1);
}

#[tokio::test]
async fn disconnect_keeps_last_known_values() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    let ctrl = controller(transport);

    ctrl.connect();
    wait_for_status(&ctrl, |s| s.is_connected()).await;
    feed.unbounded_send(Ok(Bytes::from(calm_frame(12.0)))).unwrap();
    wait_for_value(&ctrl, Category::Calm, 42.0).await;

    ctrl.disconnect();
    assert_eq!(ctrl.state(), ConnectionState::Disconnected);
    assert_eq!(ctrl.publisher().current_value(Category::Calm), 42.0);
    assert_eq!(ctrl.publisher().history(Category::Calm, 20), vec![30.0, 42.0]);
}

#[tokio::test]
async fn widget_follows_the_focused_category() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    let sink = RecordingWidgetSink::new();
    let publisher = publisher(sink.clone());
    let ctrl = controller_with(transport, publisher.clone(), Arc::new(SessionFlag::new(true)));

    assert!(publisher.start_widget(Category::Inspired));
    ctrl.connect();
    wait_for_status(&ctrl, |s| s.is_connected()).await;

    let frame = delta_frame(
        "2025-07-28T11:00:00Z",
        &[(Category::Inspired, 10.0), (Category::Calm, -5.0)],
    );
    feed.unbounded_send(Ok(Bytes::from(frame))).unwrap();
    wait_for_value(&ctrl, Category::Inspired, 40.0).await;

    let calls = sink.calls();
    match &calls[0] {
        WidgetCall::Start(update) => {
            assert_eq!(update.category, Category::Inspired);
            assert_eq!(update.delta, 0.0);
        }
        other => panic!("expected a start call, got {:?}", other),
    }

    let updates = sink.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].category, Category::Inspired);
    assert_eq!(updates[0].current_value, 40.0);
    assert_eq!(updates[0].delta, 10.0);
    assert_eq!(updates[0].history, vec![30.0, 40.0]);
    assert_eq!(updates[0].trend, Trend::Up);

    // Disconnect clears focus, so further records would not reach the widget.
    ctrl.disconnect();
    assert!(publisher.focus().is_none());

    publisher.stop_all_widgets();
    assert_eq!(sink.calls().last(), Some(&WidgetCall::StopAll));
    assert!(!publisher.widget_active());
}

#[tokio::test]
async fn widget_receives_lookbacks_from_the_stream() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    let sink = RecordingWidgetSink::new();
    let publisher = publisher(sink.clone());
    let ctrl = controller_with(transport, publisher.clone(), Arc::new(SessionFlag::new(true)));

    ctrl.connect();
    wait_for_status(&ctrl, |s| s.is_connected()).await;

    let before_focus = Lookbacks {
        one_hour_before: Some(41.0),
        six_hours_before: Some(38.5),
        one_day_before: Some(33.0),
        one_week_before: None,
    };
    let frame = sentiment_frame("2025-07-28T12:00:00Z", &[(Category::Calm, 2.0)], &before_focus);
    feed.unbounded_send(Ok(Bytes::from(frame))).unwrap();
    wait_for_value(&ctrl, Category::Calm, 32.0).await;

    assert!(publisher.start_widget(Category::Calm));
    match &sink.calls()[0] {
        WidgetCall::Start(update) => assert_eq!(update.lookbacks, before_focus),
        other => panic!("expected a start call, got {:?}", other),
    }

    let focused = Lookbacks {
        one_hour_before: Some(1.5),
        six_hours_before: Some(2.5),
        one_day_before: Some(3.5),
        one_week_before: Some(4.5),
    };
    let frame = sentiment_frame("2025-07-28T12:01:00Z", &[(Category::Calm, 3.0)], &focused);
    feed.unbounded_send(Ok(Bytes::from(frame))).unwrap();
    wait_for_value(&ctrl, Category::Calm, 35.0).await;

    let updates = sink.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].lookbacks, focused);
    assert_eq!(updates[0].current_value, 35.0);

    ctrl.disconnect();
}

#[tokio::test]
async fn no_session_means_no_transport_attempt() {
    let transport = ScriptedTransport::new();
    let session = Arc::new(SessionFlag::new(false));
    let ctrl = controller_with(transport.clone(), publisher(Arc::new(NoopWidgetSink)), session.clone());

    ctrl.connect();
    assert_eq!(ctrl.state(), ConnectionState::Disconnected);
    assert!(ctrl.last_error().is_some());
    assert_eq!(transport.opens(), 0);

    let _feed = transport.push_stream();
    session.set_valid(true);
    ctrl.connect();
    wait_for_status(&ctrl, |s| s.is_connected()).await;
    assert!(ctrl.last_error().is_none());
}

#[tokio::test]
async fn reconnect_after_failure_resumes_accumulation() {
    let transport = ScriptedTransport::new();
    transport.push(Script::Status(502));
    let feed = transport.push_stream();
    let ctrl = controller(transport.clone());
    let mut transitions = ctrl.subscribe_transitions();

    ctrl.connect();
    wait_for_status(&ctrl, |s| {
        s.last_error.as_deref() == Some("HTTP error: 502") && s.state == ConnectionState::Disconnected
    })
    .await;

    let mut seen = Vec::new();
    while let Ok(state) = transitions.try_recv() {
        seen.push(state);
    }
    assert_eq!(
        seen,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Failed("HTTP error: 502".to_string()),
            ConnectionState::Disconnected,
        ]
    );

    let started = tokio::time::Instant::now();
    ctrl.reconnect().await;
    assert!(started.elapsed() >= TEST_RECONNECT_DELAY);
    wait_for_status(&ctrl, |s| s.is_connected()).await;

    feed.unbounded_send(Ok(Bytes::from(calm_frame(1.0)))).unwrap();
    wait_for_value(&ctrl, Category::Calm, 31.0).await;
    assert_eq!(transport.opens(), 2);
    assert_eq!(ctrl.status().epoch, 2);
}

#[tokio::test]
async fn superseded_connection_never_applies_records() {
    let transport = ScriptedTransport::new();
    let old_feed = transport.push_stream();
    let new_feed = transport.push_stream();
    let ctrl = controller(transport);

    ctrl.connect();
    wait_for_status(&ctrl, |s| s.is_connected() && s.epoch == 1).await;
    ctrl.disconnect();
    ctrl.connect();
    wait_for_status(&ctrl, |s| s.is_connected() && s.epoch == 2).await;

    let _ = old_feed.unbounded_send(Ok(Bytes::from(calm_frame(50.0))));
    new_feed.unbounded_send(Ok(Bytes::from(calm_frame(2.0)))).unwrap();
    wait_for_value(&ctrl, Category::Calm, 32.0).await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(ctrl.publisher().snapshot().updates_applied, 1);
}

#[tokio::test]
async fn connecting_attempt_can_be_cancelled() {
    let transport = ScriptedTransport::new();
    transport.push(Script::Hang);
    let ctrl = controller(transport);

    ctrl.connect();
    assert_eq!(ctrl.state(), ConnectionState::Connecting);
    ctrl.disconnect();
    assert_eq!(ctrl.state(), ConnectionState::Disconnected);
    assert!(ctrl.last_error().is_none());
}

#[tokio::test]
async fn transcript_replay_runs_the_full_pipeline() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "{}{}event: ping\n\n{}data: broken\n\n{}",
        calm_frame(10.0),
        HEARTBEAT_FRAME,
        delta_frame("2025-07-28T10:05:00Z", &[(Category::Curious, 7.5)]),
        calm_frame(-3.0),
    )
    .unwrap();

    let transport = Arc::new(TranscriptTransport::new(file.path()).with_chunk_size(16));
    let ctrl = controller(transport);
    ctrl.connect();
    wait_for_status(&ctrl, |s| s.epoch == 1 && s.state == ConnectionState::Disconnected).await;

    assert!(ctrl.last_error().is_none());
    let publisher = ctrl.publisher();
    assert_eq!(publisher.current_value(Category::Calm), 37.0);
    assert_eq!(publisher.current_value(Category::Curious), 37.5);
    assert_eq!(publisher.recent_records(10).len(), 3);
    assert_eq!(
        publisher.latest_record().map(|r| r.delta(Category::Calm)),
        Some(-3.0)
    );

    let stats = ctrl.decoder_stats();
    assert_eq!(stats.records, 3);
    assert_eq!(stats.heartbeats, 1);
    assert_eq!(stats.decode_failures, 1);
}

#[tokio::test]
async fn decode_records_is_lazy_and_ordered() {
    let chunks: Vec<StreamResult<Bytes>> = vec![
        Ok(Bytes::from(calm_frame(1.0))),
        Ok(Bytes::from(HEARTBEAT_FRAME)),
        Ok(Bytes::from(format!("{}{}", calm_frame(2.0), calm_frame(3.0)))),
    ];
    let bytes: ByteStream = Box::pin(stream::iter(chunks));

    let deltas: Vec<f64> = decode_records(bytes)
        .map(|r| r.map(|record| record.delta(Category::Calm)))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_, StreamError>>()
        .unwrap();
    assert_eq!(deltas, vec![1.0, 2.0, 3.0]);
}
