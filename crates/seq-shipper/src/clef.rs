// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Compact Log Event Format (CLEF) encoding.
//!
//! A batch is encoded as newline-delimited JSON, one object per event:
//!
//! ```text
//! {"@t":"2024-05-01T12:00:00Z","@m":"a","@l":"Information","user":"alice"}
//! {"@t":"2024-05-01T12:00:01Z","@m":"b","@l":"Error","@tr":"…","@sp":"…"}
//! ```
//!
//! `@t`, `@m` and `@l` are always written. `@tr`, `@sp`, `@ps`, `@st`, `@sk` and `@ra`
//! are written only when set. Properties are merged into the top level; a property
//! name that starts with `@` is written as `@@name` so it cannot shadow a reserved
//! field.

use serde::ser::{Error as _, Serialize, SerializeMap, Serializer};
use std::borrow::Cow;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::event::Event;

pub const CONTENT_TYPE: &str = "application/vnd.serilog.clef";

/// Encodes `events` as newline-delimited CLEF.
///
/// Fails if any event holds a value that cannot be serialized; the batch is then
/// treated as a unit and nothing is sent.
pub fn encode_batch(events: &[Event]) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::with_capacity(events.len() * 256);
    for event in events {
        serde_json::to_writer(&mut buf, &ClefRecord(event))?;
        buf.push(b'\n');
    }
    Ok(buf)
}

struct ClefRecord<'a>(&'a Event);

impl Serialize for ClefRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let event = self.0;
        let mut map = serializer.serialize_map(None)?;

        map.serialize_entry("@t", &rfc3339::<S>(event.timestamp)?)?;
        map.serialize_entry("@m", &event.message)?;
        map.serialize_entry("@l", event.level.as_str())?;

        if let Some(trace_id) = non_empty(&event.trace_id) {
            map.serialize_entry("@tr", trace_id)?;
        }
        if let Some(span_id) = non_empty(&event.span_id) {
            map.serialize_entry("@sp", span_id)?;
        }
        if let Some(parent) = non_empty(&event.parent_span_id) {
            map.serialize_entry("@ps", parent)?;
        }
        if let Some(start) = event.span_start {
            map.serialize_entry("@st", &rfc3339::<S>(start)?)?;
        }
        if let Some(kind) = event.span_kind {
            map.serialize_entry("@sk", kind.as_str())?;
        }
        if !event.resource_attributes.is_empty() {
            map.serialize_entry("@ra", &event.resource_attributes)?;
        }

        for (key, value) in &event.properties {
            map.serialize_entry(escape_key(key).as_ref(), value)?;
        }
        map.end()
    }
}

fn rfc3339<S: Serializer>(ts: OffsetDateTime) -> Result<String, S::Error> {
    ts.format(&Rfc3339).map_err(S::Error::custom)
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

fn escape_key(key: &str) -> Cow<'_, str> {
    if key.starts_with('@') {
        Cow::Owned(format!("@{key}"))
    } else {
        Cow::Borrowed(key)
    }
}
