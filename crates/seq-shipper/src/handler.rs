// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Structured-logging handler that turns records into [`Event`]s.
//!
//! A [`SeqHandler`] is an immutable view: [`SeqHandler::with_attributes`] and
//! [`SeqHandler::with_group`] return new handlers that share the pipeline's shard set
//! and never modify the handler they were derived from.
//!
//! Attributes are flattened to dotted paths (`group.key`) and then nested again by
//! [`crate::properties::build`], so a group-valued attribute and a `with_group` call with
//! the same name produce the same property tree.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::event::{ClefLevel, Event};
use crate::properties;
use crate::stats::StatsSnapshot;
use crate::value::{Map, Value};

/// Replacement text used by [`redact_keys`].
pub const REDACTED: &str = "*****";

/// Default property name for the source location.
pub const DEFAULT_SOURCE_KEY: &str = "source";

/// Severity on the handler side. Higher is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(i8);

impl Level {
    pub const TRACE: Level = Level(-8);
    pub const DEBUG: Level = Level(-4);
    pub const INFO: Level = Level(0);
    pub const WARN: Level = Level(4);
    pub const ERROR: Level = Level(8);

    #[must_use]
    pub const fn new(severity: i8) -> Self {
        Level(severity)
    }

    /// Only the four named levels map to a known wire level.
    #[must_use]
    pub const fn to_clef(self) -> ClefLevel {
        match self.0 {
            -4 => ClefLevel::Debug,
            0 => ClefLevel::Information,
            4 => ClefLevel::Warning,
            8 => ClefLevel::Error,
            _ => ClefLevel::Unknown,
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::INFO
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::TRACE,
            tracing::Level::DEBUG => Level::DEBUG,
            tracing::Level::INFO => Level::INFO,
            tracing::Level::WARN => Level::WARN,
            tracing::Level::ERROR => Level::ERROR,
        }
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" | "information" => Ok(Level::INFO),
            "warn" | "warning" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            other => Err(Error::InvalidConfig(format!("unknown log level: {other}"))),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Level::TRACE => f.write_str("TRACE"),
            Level::DEBUG => f.write_str("DEBUG"),
            Level::INFO => f.write_str("INFO"),
            Level::WARN => f.write_str("WARN"),
            Level::ERROR => f.write_str("ERROR"),
            Level(n) => write!(f, "LEVEL({n})"),
        }
    }
}

/// A key/value pair. A [`Value::Map`] value is treated as a group of attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub key: String,
    pub value: Value,
}

impl Attr {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Attr {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Groups `members` under `key`, like logging them through `with_group(key)`.
    pub fn group(key: impl Into<String>, members: impl IntoIterator<Item = Attr>) -> Self {
        let map: Map = members
            .into_iter()
            .map(|attr| (attr.key, attr.value))
            .collect();
        Attr {
            key: key.into(),
            value: Value::Map(map),
        }
    }
}

/// Where a log call was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub file: String,
    pub line: u32,
    pub function: String,
}

impl Source {
    fn into_value(self) -> Value {
        let mut map = Map::new();
        map.insert("file".to_string(), Value::String(self.file));
        map.insert("line".to_string(), Value::UInt(u64::from(self.line)));
        map.insert("function".to_string(), Value::String(self.function));
        Value::Map(map)
    }
}

/// Trace correlation for a log record, as lowercase hex ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
}

/// One log call, as seen by the handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Defaults to the time the record is handled.
    pub time: Option<OffsetDateTime>,
    pub level: Level,
    pub message: String,
    pub attrs: Vec<Attr>,
    pub source: Option<Source>,
    pub trace: Option<TraceContext>,
}

impl Record {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Record {
            time: None,
            level,
            message: message.into(),
            attrs: Vec::new(),
            source: None,
            trace: None,
        }
    }

    #[must_use]
    pub fn with_time(mut self, time: OffsetDateTime) -> Self {
        self.time = Some(time);
        self
    }

    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.push(Attr::new(key, value));
        self
    }

    #[must_use]
    pub fn with_attrs(mut self, attrs: impl IntoIterator<Item = Attr>) -> Self {
        self.attrs.extend(attrs);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn with_trace(mut self, trace: TraceContext) -> Self {
        self.trace = Some(trace);
        self
    }
}

/// Rewrites or drops an attribute before it becomes a property.
///
/// Receives the groups the attribute is nested in. Returning `None` drops it.
pub type Redactor = Arc<dyn Fn(&[String], Attr) -> Option<Attr> + Send + Sync>;

/// Builds a [`Redactor`] that replaces the value of every attribute named in `keys`
/// with [`REDACTED`], at any group depth.
pub fn redact_keys<I, S>(keys: I) -> Redactor
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let keys: HashSet<String> = keys.into_iter().map(Into::into).collect();
    Arc::new(move |_groups: &[String], mut attr: Attr| {
        if keys.contains(&attr.key) {
            attr.value = Value::from(REDACTED);
        }
        Some(attr)
    })
}

#[derive(Clone)]
pub struct HandlerOptions {
    pub min_level: Level,
    pub add_source: bool,
    pub source_key: String,
    /// Merged into every event, before any other attribute.
    pub global_attrs: Vec<Attr>,
    pub redactor: Option<Redactor>,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        HandlerOptions {
            min_level: Level::INFO,
            add_source: false,
            source_key: DEFAULT_SOURCE_KEY.to_string(),
            global_attrs: Vec::new(),
            redactor: None,
        }
    }
}

impl fmt::Debug for HandlerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerOptions")
            .field("min_level", &self.min_level)
            .field("add_source", &self.add_source)
            .field("source_key", &self.source_key)
            .field("global_attrs", &self.global_attrs)
            .field("redactor", &self.redactor.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub struct SeqHandler {
    dispatcher: Arc<Dispatcher>,
    options: Arc<HandlerOptions>,
    /// Already redacted and flattened, in insertion order.
    attrs: Arc<[(String, Value)]>,
    groups: Arc<[String]>,
}

impl SeqHandler {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, options: HandlerOptions) -> Self {
        let mut attrs = Vec::new();
        for attr in options.global_attrs.iter().cloned() {
            flatten(&mut attrs, options.redactor.as_ref(), &[], attr);
        }
        SeqHandler {
            dispatcher,
            options: Arc::new(options),
            attrs: attrs.into(),
            groups: Arc::from(Vec::new()),
        }
    }

    #[must_use]
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.options.min_level
    }

    #[must_use]
    pub fn options(&self) -> &HandlerOptions {
        &self.options
    }

    /// Counters of the pipeline this handler feeds.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.dispatcher.stats().snapshot()
    }

    /// Returns a handler that adds `attrs`, nested under the currently open groups, to
    /// every record it handles.
    #[must_use]
    pub fn with_attributes(&self, attrs: impl IntoIterator<Item = Attr>) -> Self {
        let mut flat = self.attrs.to_vec();
        for attr in attrs {
            flatten(&mut flat, self.options.redactor.as_ref(), &self.groups, attr);
        }
        SeqHandler {
            attrs: flat.into(),
            ..self.clone()
        }
    }

    /// Returns a handler that nests every later attribute under `name`.
    #[must_use]
    pub fn with_group(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() {
            return self.clone();
        }
        let mut groups = self.groups.to_vec();
        groups.push(name);
        SeqHandler {
            groups: groups.into(),
            ..self.clone()
        }
    }

    /// Converts `record` to an event and submits it. Never fails and never blocks.
    pub fn handle(&self, record: Record) {
        if !self.enabled(record.level) {
            return;
        }
        let redactor = self.options.redactor.as_ref();

        let mut flat = self.attrs.to_vec();
        for attr in record.attrs {
            flatten(&mut flat, redactor, &self.groups, attr);
        }
        if self.options.add_source {
            if let Some(source) = record.source {
                let attr = Attr {
                    key: self.options.source_key.clone(),
                    value: source.into_value(),
                };
                flatten(&mut flat, redactor, &[], attr);
            }
        }

        let timestamp = record.time.unwrap_or_else(OffsetDateTime::now_utc);
        let mut event = Event::new(timestamp, record.message, record.level.to_clef())
            .with_properties(properties::build(flat));
        if let Some(trace) = record.trace {
            event.trace_id = Some(trace.trace_id);
            event.span_id = Some(trace.span_id);
            event.parent_span_id = trace.parent_span_id;
        }
        self.dispatcher.submit(event);
    }

    /// Enqueues an already built event, bypassing level filtering and attributes.
    pub fn submit(&self, event: Event) {
        self.dispatcher.submit(event);
    }
}

impl fmt::Debug for SeqHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeqHandler")
            .field("options", &self.options)
            .field("groups", &self.groups)
            .field("attrs", &self.attrs.len())
            .finish_non_exhaustive()
    }
}

fn flatten(
    out: &mut Vec<(String, Value)>,
    redactor: Option<&Redactor>,
    groups: &[String],
    attr: Attr,
) {
    let attr = match redactor {
        Some(redact) => match redact(groups, attr) {
            Some(attr) => attr,
            None => return,
        },
        None => attr,
    };
    if attr.key.is_empty() {
        return;
    }
    match attr.value {
        Value::Map(members) => {
            let mut nested = groups.to_vec();
            nested.push(attr.key);
            for (key, value) in members {
                flatten(out, redactor, &nested, Attr { key, value });
            }
        }
        value => {
            let path = if groups.is_empty() {
                attr.key
            } else {
                format!("{}.{}", groups.join("."), attr.key)
            };
            out.push((path, value));
        }
    }
}
