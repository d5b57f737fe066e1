// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use common::mocks::RecordingSink;
use mockito::{Matcher, Server};
use opentelemetry::trace::{Span as _, SpanKind as OtelSpanKind, Tracer as _, TracerProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_sdk::trace::TracerProvider;
use seq_shipper::{redact_keys, Attr, Config, Level, Pipeline, Record, SpanKind};
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing_subscriber::layer::SubscriberExt;

const HOUR: Duration = Duration::from_secs(3600);

fn config() -> Config {
    Config::new("http://localhost:5341/ingest/clef")
        .with_batch_size(100)
        .with_flush_interval(HOUR)
}

#[tokio::test(start_paused = true)]
async fn full_batch_is_sent_at_once_and_lone_event_after_interval() {
    let (sink, mut sent) = RecordingSink::new();
    let interval = Duration::from_secs(10);
    let pipeline = Pipeline::with_sink(
        config().with_batch_size(2).with_flush_interval(interval),
        Arc::new(sink),
    )
    .expect("failed to start pipeline");
    let handler = pipeline.handler();

    let start = Instant::now();
    handler.handle(Record::new(Level::INFO, "a"));
    handler.handle(Record::new(Level::INFO, "b"));
    let first = sent.recv().await.unwrap();
    assert_eq!(first.messages, vec!["a", "b"]);
    assert!(start.elapsed() < interval);

    let submitted = Instant::now();
    handler.handle(Record::new(Level::INFO, "c"));
    let second = sent.recv().await.unwrap();
    assert_eq!(second.messages, vec!["c"]);
    assert!(submitted.elapsed() <= interval);

    pipeline.close().await;
}

#[tokio::test]
async fn close_delivers_every_queued_event_in_order() {
    let (sink, _sent) = RecordingSink::new();
    let sink = Arc::new(sink);
    let pipeline = Pipeline::with_sink(config().with_batch_size(50), sink.clone())
        .expect("failed to start pipeline");
    let handler = pipeline.handler();

    let expected: Vec<String> = (0..200).map(|i| format!("event-{i:03}")).collect();
    for message in &expected {
        handler.handle(Record::new(Level::INFO, message.clone()));
    }
    pipeline.close().await;

    assert_eq!(sink.delivered(), expected);
    assert!(sink.batches().iter().all(|b| b.messages.len() <= 50));
    let stats = handler.stats();
    assert_eq!(stats.sent, 200);
    assert_eq!(stats.dropped, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_batch_is_retried_ahead_of_the_next_one() {
    let (sink, mut sent) = RecordingSink::failing_first(1);
    let sink = Arc::new(sink);
    let pipeline = Pipeline::with_sink(config().with_batch_size(1), sink.clone())
        .expect("failed to start pipeline");
    let handler = pipeline.handler();

    handler.handle(Record::new(Level::INFO, "first"));
    assert!(!sent.recv().await.unwrap().delivered);

    handler.handle(Record::new(Level::INFO, "second"));
    let retried = sent.recv().await.unwrap();
    let fresh = sent.recv().await.unwrap();
    assert_eq!(retried.messages, vec!["first"]);
    assert!(retried.delivered);
    assert_eq!(fresh.messages, vec!["second"]);
    assert!(fresh.delivered);

    pipeline.close().await;
    assert_eq!(sink.delivered(), vec!["first", "second"]);
}

#[tokio::test]
async fn saturated_queue_drops_instead_of_blocking() {
    let (sink, _sent) = RecordingSink::new();
    let sink = Arc::new(sink);
    let pipeline = Pipeline::with_sink(config().with_queue_capacity(5), sink.clone())
        .expect("failed to start pipeline");
    let handler = pipeline.handler();

    // the worker cannot run until this test yields, so the queue fills up
    for i in 0..20 {
        handler.handle(Record::new(Level::INFO, i.to_string()));
    }
    let stats = pipeline.stats();
    assert_eq!(stats.submitted, 5);
    assert_eq!(stats.dropped, 15);

    pipeline.close().await;
    assert_eq!(sink.delivered(), vec!["0", "1", "2", "3", "4"]);
}

#[tokio::test]
async fn ships_clef_batches_over_http() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/ingest/clef")
        .match_header("Content-Type", "application/vnd.serilog.clef")
        .match_header("X-Seq-ApiKey", "integration-key")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""@m":"order placed","@l":"Information""#.to_string()),
            Matcher::Regex(r#""order":\{"id":1234,"total":99.5\}"#.to_string()),
            Matcher::Regex(r#""@m":"payment failed","@l":"Error""#.to_string()),
            Matcher::Regex(r#""app":"shop""#.to_string()),
        ]))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;

    let config = Config::new(format!("{}/ingest/clef", server.url()))
        .with_api_key("integration-key")
        .with_batch_size(10)
        .with_flush_interval(HOUR)
        .with_global_attrs([Attr::new("app", "shop")]);
    let pipeline = Pipeline::start(config).expect("failed to start pipeline");
    let handler = pipeline.handler().with_group("order");

    handler.handle(
        Record::new(Level::INFO, "order placed")
            .with_attr("id", 1234)
            .with_attr("total", 99.5),
    );
    handler.handle(Record::new(Level::ERROR, "payment failed"));
    pipeline.close().await;

    mock.assert_async().await;
    assert_eq!(handler.stats().sent, 2);
}

#[tokio::test]
async fn rejected_batch_is_kept_for_retry_not_dropped() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/ingest/clef")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let pipeline = Pipeline::start(
        Config::new(format!("{}/ingest/clef", server.url()))
            .with_batch_size(10)
            .with_flush_interval(HOUR),
    )
    .expect("failed to start pipeline");
    let handler = pipeline.handler();

    handler.handle(Record::new(Level::WARN, "will not arrive"));
    pipeline
        .close_with_timeout(Duration::from_secs(10))
        .await
        .expect("close timed out");

    mock.assert_async().await;
    let stats = handler.stats();
    assert_eq!(stats.sent, 0);
    assert_eq!(stats.failed_attempts, 1);
    assert_eq!(stats.purged, 0);
}

#[tokio::test]
async fn unreachable_endpoint_does_not_block_close() {
    let pipeline = Pipeline::start(
        Config::new("http://127.0.0.1:9/ingest/clef")
            .with_request_timeout(Duration::from_secs(2))
            .with_flush_interval(HOUR),
    )
    .expect("failed to start pipeline");
    let handler = pipeline.handler();

    handler.handle(Record::new(Level::INFO, "lost"));
    pipeline
        .close_with_timeout(Duration::from_secs(10))
        .await
        .expect("close timed out");

    assert_eq!(handler.stats().failed_attempts, 1);
}

#[tokio::test]
async fn tracing_events_carry_span_context_to_endpoint() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/ingest/clef")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""@m":"cache miss","@l":"Warning","@tr":"[0-9a-f]{32}","@sp":"[0-9a-f]{16}""#.to_string()),
            Matcher::Regex(r#""key":"user:42""#.to_string()),
            Matcher::Regex(r#""request_id":"abc""#.to_string()),
        ]))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;

    let pipeline = Pipeline::start(
        Config::new(format!("{}/ingest/clef", server.url())).with_flush_interval(HOUR),
    )
    .expect("failed to start pipeline");
    let subscriber = tracing_subscriber::registry().with(pipeline.layer());

    {
        let _guard = tracing::subscriber::set_default(subscriber);
        let span = tracing::info_span!("request", request_id = "abc");
        let _entered = span.enter();
        tracing::warn!(target: "cache", key = "user:42", "cache miss");
        tracing::debug!(target: "cache", "below the minimum level");
    }
    pipeline.close().await;

    mock.assert_async().await;
}

#[tokio::test]
async fn span_events_are_shipped_with_trace_fields() {
    let (sink, _sent) = RecordingSink::new();
    let sink = Arc::new(sink);
    let pipeline =
        Pipeline::with_sink(config(), sink.clone()).expect("failed to start pipeline");
    let provider = TracerProvider::builder()
        .with_span_processor(pipeline.span_processor())
        .build();
    let tracer = provider.tracer("checkout");

    let mut span = tracer
        .span_builder("checkout")
        .with_kind(OtelSpanKind::Client)
        .start(&tracer);
    let trace_id = span.span_context().trace_id().to_string();
    span.add_event("started", Vec::new());
    span.add_event("exception", vec![KeyValue::new("exception.message", "timeout")]);
    span.end();
    pipeline.close().await;

    let batches = sink.batches();
    let events: Vec<_> = batches.iter().flat_map(|b| b.events.iter()).collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].message, "started");
    assert_eq!(events[1].message, "timeout");
    assert_eq!(events[0].trace_id.as_deref(), Some(trace_id.as_str()));
    assert_eq!(events[0].span_id.as_ref().map(String::len), Some(16));
    assert_eq!(events[0].parent_span_id, None);
    assert_eq!(events[0].span_kind, Some(SpanKind::Client));
}

#[tokio::test]
async fn redacted_values_never_reach_the_sink() {
    let (sink, _sent) = RecordingSink::new();
    let sink = Arc::new(sink);
    let pipeline = Pipeline::with_sink(
        config().with_redactor(redact_keys(["password"])),
        sink.clone(),
    )
    .expect("failed to start pipeline");

    pipeline.handler().handle(
        Record::new(Level::INFO, "login")
            .with_attr("user", "ada")
            .with_attr("password", "hunter2"),
    );
    pipeline.close().await;

    let batches = sink.batches();
    let event = &batches[0].events[0];
    assert_eq!(
        event.properties.get("password").and_then(|v| v.as_str()),
        Some("*****")
    );
    assert_eq!(event.properties.get("user").and_then(|v| v.as_str()), Some("ada"));
}
