// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Span events as log events.
//!
//! [`LoggingSpanProcessor`] plugs into an OpenTelemetry tracer provider. Every event
//! recorded on a finished span becomes an [`Event`] carrying the span's trace context,
//! submitted through the same handler used for direct log calls.
//!
//! ```no_run
//! use opentelemetry::trace::{Span as _, Tracer as _, TracerProvider as _};
//! use opentelemetry_sdk::trace::TracerProvider;
//! use seq_shipper::{Config, Pipeline};
//!
//! # async fn run() -> Result<(), seq_shipper::Error> {
//! let pipeline = Pipeline::start(Config::new("http://localhost:5341/ingest/clef"))?;
//! let provider = TracerProvider::builder()
//!     .with_span_processor(pipeline.span_processor())
//!     .build();
//! let mut span = provider.tracer("checkout").start("charge card");
//! span.add_event("card accepted", Vec::new());
//! span.end();
//! pipeline.close().await;
//! # Ok(())
//! # }
//! ```

use opentelemetry::trace::{Event as SpanEvent, SpanId, SpanKind as OtelSpanKind, TraceResult};
use opentelemetry::{Context, KeyValue, Value as OtelValue};
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::trace::{Span, SpanProcessor};
use opentelemetry_sdk::Resource;
use time::OffsetDateTime;

use crate::event::{ClefLevel, Event, SpanKind};
use crate::handler::SeqHandler;
use crate::properties;
use crate::value::Value;

/// Attribute whose string value replaces the message of a span event.
pub const EXCEPTION_MESSAGE_KEY: &str = "exception.message";
/// Name of span events that record an exception.
pub const EXCEPTION_EVENT_NAME: &str = "exception";

/// Logs every span event through a [`SeqHandler`].
///
/// Span events bypass the handler's level filter and attributes; they are submitted
/// as built. Without a configured resource, each event's resource attributes default
/// to `service.name` set to the span name.
#[derive(Debug, Clone)]
pub struct LoggingSpanProcessor {
    handler: SeqHandler,
    resource: Option<Resource>,
}

impl LoggingSpanProcessor {
    #[must_use]
    pub fn new(handler: SeqHandler) -> Self {
        LoggingSpanProcessor {
            handler,
            resource: None,
        }
    }

    /// Attaches `resource` to every event instead of the per-span default.
    #[must_use]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = (!resource.is_empty()).then_some(resource);
        self
    }

    /// Processes a batch of finished spans, in order.
    pub fn export_spans(&self, batch: Vec<SpanData>) {
        for span in batch {
            self.log_span(&span);
        }
    }

    fn log_span(&self, span: &SpanData) {
        if !span.span_context.is_valid() {
            return;
        }
        for span_event in span.events.iter() {
            self.handler.submit(self.to_event(span, span_event));
        }
    }

    fn to_event(&self, span: &SpanData, span_event: &SpanEvent) -> Event {
        let mut message = span_event.name.to_string();
        let mut level = if span_event.name == EXCEPTION_EVENT_NAME {
            ClefLevel::Error
        } else {
            ClefLevel::Information
        };
        if let Some(OtelValue::String(exception)) = span_event
            .attributes
            .iter()
            .find(|kv| kv.key.as_str() == EXCEPTION_MESSAGE_KEY)
            .map(|kv| &kv.value)
        {
            message = exception.as_str().to_string();
            level = ClefLevel::Error;
        }

        let properties = properties::build(span_event.attributes.iter().map(flat_pair));
        let resource_attributes = match &self.resource {
            Some(resource) => properties::build(
                resource
                    .iter()
                    .map(|(key, value)| (key.as_str().to_string(), to_value(value))),
            ),
            None => properties::build([(
                "service.name".to_string(),
                Value::String(span.name.to_string()),
            )]),
        };

        let mut event = Event::new(OffsetDateTime::from(span_event.timestamp), message, level)
            .with_properties(properties);
        event.trace_id = Some(span.span_context.trace_id().to_string());
        event.span_id = Some(span.span_context.span_id().to_string());
        event.parent_span_id =
            (span.parent_span_id != SpanId::INVALID).then(|| span.parent_span_id.to_string());
        event.span_start = Some(OffsetDateTime::from(span.start_time));
        event.span_kind = Some(to_span_kind(&span.span_kind));
        event.resource_attributes = resource_attributes;
        event
    }
}

impl SpanProcessor for LoggingSpanProcessor {
    fn on_start(&self, _span: &mut Span, _cx: &Context) {}

    fn on_end(&self, span: SpanData) {
        self.log_span(&span);
    }

    fn force_flush(&self) -> TraceResult<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> TraceResult<()> {
        Ok(())
    }
}

fn flat_pair(kv: &KeyValue) -> (String, Value) {
    (kv.key.as_str().to_string(), to_value(&kv.value))
}

fn to_value(value: &OtelValue) -> Value {
    match value {
        OtelValue::Bool(b) => Value::Bool(*b),
        OtelValue::I64(i) => Value::Int(*i),
        OtelValue::F64(f) => Value::Float(*f),
        OtelValue::String(s) => Value::String(s.as_str().to_string()),
        // arrays keep their rendered form
        other => Value::String(other.to_string()),
    }
}

fn to_span_kind(kind: &OtelSpanKind) -> SpanKind {
    match kind {
        OtelSpanKind::Client => SpanKind::Client,
        OtelSpanKind::Server => SpanKind::Server,
        OtelSpanKind::Producer => SpanKind::Producer,
        OtelSpanKind::Consumer => SpanKind::Consumer,
        OtelSpanKind::Internal => SpanKind::Internal,
    }
}
