// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sends a handful of log records, `tracing` events and span events to the endpoint in
//! `SEQ_URL`, then shuts the pipeline down and prints the delivery counters.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use std::{env, path::Path, sync::Arc};

use anyhow::Context;
use opentelemetry::trace::{Span as _, Tracer as _, TracerProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_sdk::{trace::TracerProvider, Resource};
use seq_shipper::{redact_keys, Attr, Config, Level, Pipeline, Record, Redactor, Value};
use tokio::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_level = env::var("SEQ_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let config = Config::from_env().context("SEQ_URL must point at a Seq ingestion endpoint")?;
    let source_key = config.source_key.clone();
    let config = config
        .with_min_level(Level::DEBUG)
        .with_source(source_key.clone())
        .with_global_attrs([
            Attr::new("app", "seqtest"),
            Attr::new("version", env!("CARGO_PKG_VERSION")),
        ])
        .with_redactor(redactor(source_key));

    let pipeline = Pipeline::start(config).context("failed to start the shipper")?;

    let env_filter = format!("h2=off,hyper=off,rustls=off,{log_level}");
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::try_new(env_filter).context("could not parse SEQ_LOG_LEVEL")?)
        .with(tracing_subscriber::fmt::layer().with_thread_names(false))
        .with(pipeline.layer());
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    send_records(&pipeline);
    send_tracing_events().await;
    send_span(&pipeline);

    let handler = pipeline.handler();
    pipeline
        .close_with_timeout(CLOSE_TIMEOUT)
        .await
        .context("pipeline did not drain in time")?;
    let stats = handler.stats();
    println!(
        "submitted={} sent={} dropped={} failed_attempts={}",
        stats.submitted, stats.sent, stats.dropped, stats.failed_attempts
    );
    Ok(())
}

/// Masks passwords and trims the call site's file to its base name.
fn redactor(source_key: String) -> Redactor {
    let redact = redact_keys(["password"]);
    Arc::new(move |groups: &[String], attr: Attr| {
        let mut attr = redact(groups, attr)?;
        if attr.key == "file" && groups.last() == Some(&source_key) {
            if let Some(name) = attr
                .value
                .as_str()
                .and_then(|file| Path::new(file).file_name())
                .and_then(|name| name.to_str())
            {
                attr.value = Value::from(name);
            }
        }
        Some(attr)
    })
}

fn send_records(pipeline: &Pipeline) {
    let handler = pipeline.handler();
    handler.handle(
        Record::new(Level::INFO, "seqtest started").with_attr("pid", std::process::id()),
    );
    handler.handle(
        Record::new(Level::INFO, "user signed in")
            .with_attr("user", "ada")
            .with_attr("password", "correct horse battery staple"),
    );

    let http = handler.with_group("http");
    http.handle(
        Record::new(Level::WARN, "slow response")
            .with_attr("status", 200)
            .with_attr("elapsed_ms", 1840.5),
    );
    http.handle(Record::new(Level::ERROR, "upstream unavailable").with_attr("status", 503));
    handler.handle(Record::new(Level::DEBUG, "debug details").with_attr("cache_hits", 12u64));
}

async fn send_tracing_events() {
    async {
        info!(step = "fetch", "job started");
        tokio::time::sleep(Duration::from_millis(10)).await;
        warn!(retries = 2, "job is slow");
        error!(reason = "timeout", "job failed");
        debug!("job cleanup done");
    }
    .instrument(info_span!("job", job_id = 42))
    .await;
}

fn send_span(pipeline: &Pipeline) {
    let processor = pipeline
        .span_processor()
        .with_resource(Resource::new([KeyValue::new("service.name", "seqtest")]));
    let provider = TracerProvider::builder()
        .with_span_processor(processor)
        .build();
    let tracer = provider.tracer("seqtest");

    let mut span = tracer.start("warm cache");
    span.add_event("cache warmed", vec![KeyValue::new("entries", 128_i64)]);
    span.add_event("exception", vec![KeyValue::new("exception.message", "lookup failed")]);
    span.end();
}
