// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `tracing` integration.
//!
//! [`SeqLayer`] converts every `tracing` event into a [`Record`] for its [`SeqHandler`].
//! Fields recorded on enclosing spans become attributes of the event, and the span
//! scope supplies the trace context: the root span id is the trace id, the innermost
//! span is the span id and its parent the parent span id.
//!
//! Span ids come from the subscriber's registry, which reuses them once a span closes.
//! They correlate events within a process but are not globally unique.
//!
//! Events from the shipper and its HTTP stack are skipped so that diagnostics about a
//! failing sink are never fed back into that sink.

use std::fmt::Debug;
use tracing::field::{Field, Visit};
use tracing::span;
use tracing::Subscriber;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::handler::{Attr, Level, Record, SeqHandler, Source, TraceContext};
use crate::value::Value;

const INTERNAL_TARGETS: [&str; 6] = [
    "seq_shipper",
    "hyper",
    "hyper_util",
    "h2",
    "reqwest",
    "rustls",
];

#[derive(Debug, Clone)]
pub struct SeqLayer {
    handler: SeqHandler,
}

impl SeqLayer {
    #[must_use]
    pub fn new(handler: SeqHandler) -> Self {
        SeqLayer { handler }
    }

    #[must_use]
    pub fn handler(&self) -> &SeqHandler {
        &self.handler
    }
}

fn is_internal(target: &str) -> bool {
    INTERNAL_TARGETS.iter().any(|prefix| {
        target
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

/// Fields recorded on a span, kept in the span's extensions.
struct SpanFields(Vec<Attr>);

#[derive(Debug, Default)]
struct FieldVisitor {
    message: Option<String>,
    attrs: Vec<Attr>,
}

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: Value) {
        let name = field.name();
        // tracing-log metadata, already covered by the event's own metadata
        if name.starts_with("log.") {
            return;
        }
        self.attrs.push(Attr::new(name, value));
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.push(field, Value::from(value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.push(field, Value::String(format!("{value:?}")));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::Int(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::UInt(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::Float(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::Bool(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Value::String(value.to_string()));
    }
}

impl<S> Layer<S> for SeqLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        span.extensions_mut().insert(SpanFields(visitor.attrs));
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(fields) => fields.0.extend(visitor.attrs),
            None => extensions.insert(SpanFields(visitor.attrs)),
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_internal(metadata.target()) {
            return;
        }
        let level = Level::from(*metadata.level());
        if !self.handler.enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut attrs = Vec::new();
        let mut trace = None;
        if let Some(scope) = ctx.event_scope(event) {
            let spans: Vec<_> = scope.from_root().collect();
            for span in &spans {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    attrs.extend(fields.0.iter().cloned());
                }
            }
            if let (Some(root), Some(leaf)) = (spans.first(), spans.last()) {
                trace = Some(TraceContext {
                    trace_id: format!("{:032x}", root.id().into_u64()),
                    span_id: format!("{:016x}", leaf.id().into_u64()),
                    parent_span_id: leaf
                        .parent()
                        .map(|parent| format!("{:016x}", parent.id().into_u64())),
                });
            }
        }
        attrs.extend(visitor.attrs);

        let mut record =
            Record::new(level, visitor.message.unwrap_or_default()).with_attrs(attrs);
        if let Some(trace) = trace {
            record = record.with_trace(trace);
        }
        if self.handler.options().add_source {
            if let (Some(file), Some(line)) = (metadata.file(), metadata.line()) {
                record = record.with_source(Source {
                    file: file.to_string(),
                    line,
                    function: metadata.module_path().unwrap_or_default().to_string(),
                });
            }
        }
        self.handler.handle(record);
    }
}
