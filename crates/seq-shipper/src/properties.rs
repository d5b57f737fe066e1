// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Re-nesting of dotted attribute keys into a property tree.
//!
//! Grouped logging calls produce flat keys such as `request.headers.Accept`. Before an
//! event is queued, those keys are split on `.` and each segment becomes one level of
//! nesting:
//!
//! ```text
//!   request.id             = "1234"          request ─┬─ id = "1234"
//!   request.headers.Accept = "text/html"  =>          └─ headers ── Accept = "text/html"
//! ```
//!
//! # Collision policy
//!
//! Input is applied in order and the later write wins:
//!
//! - A path that runs through a segment currently bound to a scalar replaces that
//!   scalar with a map (`a = "x"` then `a.b = 1` gives `{a: {b: 1}}`).
//! - A scalar written at a segment currently bound to a map replaces the map.
//! - A map written at a segment currently bound to a map is merged into it, key by key,
//!   with the same rules applied recursively.
//!
//! Empty segments (`a..b`, `.a`, `a.`) are skipped; a key made only of dots is ignored.

use crate::value::{Map, Value};

/// Builds a nested property map from `(dotted key, value)` pairs, in order.
#[must_use]
pub fn build<I>(flat: I) -> Map
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut tree = Map::new();
    for (key, value) in flat {
        insert_path(&mut tree, &key, value);
    }
    tree
}

/// Inserts `value` at the dotted `path` inside `tree`.
pub fn insert_path(tree: &mut Map, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut node = tree;
    for segment in parents {
        let slot = node
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Map(Map::new()));
        if !slot.is_map() {
            *slot = Value::Map(Map::new());
        }
        let Value::Map(next) = slot else {
            return;
        };
        node = next;
    }

    merge_into(node, last, value);
}

fn merge_into(node: &mut Map, key: &str, value: Value) {
    match (node.get_mut(key), value) {
        (Some(Value::Map(existing)), Value::Map(incoming)) => {
            for (k, v) in incoming {
                merge_into(existing, &k, v);
            }
        }
        (_, value) => {
            node.insert(key.to_string(), value);
        }
    }
}
