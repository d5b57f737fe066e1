// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The in-memory event record shipped to the ingestion endpoint.
//!
//! An [`Event`] is created when a log call or span event is captured, moved into exactly
//! one shard queue, and dropped after it is sent or purged from a retry buffer.

use std::fmt;
use time::OffsetDateTime;

use crate::value::Map;

/// Severity names understood by the ingestion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClefLevel {
    Debug,
    Information,
    Warning,
    Error,
    Unknown,
}

impl ClefLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ClefLevel::Debug => "Debug",
            ClefLevel::Information => "Information",
            ClefLevel::Warning => "Warning",
            ClefLevel::Error => "Error",
            ClefLevel::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ClefLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpanKind {
    #[default]
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

impl SpanKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SpanKind::Internal => "Internal",
            SpanKind::Server => "Server",
            SpanKind::Client => "Client",
            SpanKind::Producer => "Producer",
            SpanKind::Consumer => "Consumer",
        }
    }
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One log or span event.
///
/// The trace-correlation fields are only written on the wire when set, and
/// `resource_attributes` only when non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub timestamp: OffsetDateTime,
    pub message: String,
    pub level: ClefLevel,
    /// Nested property tree, merged into the top level of the encoded object.
    pub properties: Map,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub parent_span_id: Option<String>,
    pub span_start: Option<OffsetDateTime>,
    pub span_kind: Option<SpanKind>,
    pub resource_attributes: Map,
}

impl Event {
    #[must_use]
    pub fn new(timestamp: OffsetDateTime, message: impl Into<String>, level: ClefLevel) -> Self {
        Event {
            timestamp,
            message: message.into(),
            level,
            properties: Map::new(),
            trace_id: None,
            span_id: None,
            parent_span_id: None,
            span_start: None,
            span_kind: None,
            resource_attributes: Map::new(),
        }
    }

    #[must_use]
    pub fn with_properties(mut self, properties: Map) -> Self {
        self.properties = properties;
        self
    }
}
