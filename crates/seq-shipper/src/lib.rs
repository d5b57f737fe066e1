// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # seq-shipper
//!
//! Ships structured log and span events to a [Seq](https://datalust.co/seq)-compatible
//! ingestion endpoint as newline-delimited CLEF.
//!
//! ## Overview
//!
//! ```text
//!   producers ──▶ SeqHandler ──▶ Dispatcher ──▶ shard queue ─▶ Shard ─▶ RetryBuffer ─▶ Sink
//!   (log calls,    (attributes,   (round-robin,   (bounded)     (batch by    (retry first,
//!    tracing,       groups,        drop when                     size and     purge stale)
//!    span events)   redaction)     full)                         time)
//! ```
//!
//! Logging never blocks and never fails at the call site. A full shard queue drops the
//! event, and delivery failures stay inside the shard's retry buffer until they are
//! delivered or older than the purge window. Entries evicted by the purge are the only
//! events lost without being delivered.
//!
//! ## Usage
//!
//! ```no_run
//! use seq_shipper::{Config, Level, Pipeline, Record};
//!
//! # async fn run() -> Result<(), seq_shipper::Error> {
//! let pipeline = Pipeline::start(Config::new("http://localhost:5341/ingest/clef"))?;
//! let handler = pipeline.handler().with_group("http");
//! handler.handle(Record::new(Level::INFO, "request served").with_attr("status", 200));
//! pipeline.close().await;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![deny(unused_extern_crates)]

pub mod clef;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod global;
pub mod handler;
pub mod http;
pub mod layer;
pub mod pipeline;
pub mod properties;
pub mod retry;
pub mod shard;
pub mod sink;
pub mod spans;
pub mod stats;
pub mod value;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{Error, SendError};
pub use event::{ClefLevel, Event, SpanKind};
pub use handler::{
    redact_keys, Attr, HandlerOptions, Level, Record, Redactor, SeqHandler, Source,
    TraceContext,
};
pub use layer::SeqLayer;
pub use pipeline::Pipeline;
pub use sink::{HttpSink, Sink};
pub use spans::LoggingSpanProcessor;
pub use stats::StatsSnapshot;
pub use value::{Map, Value};
