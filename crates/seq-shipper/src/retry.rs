// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Best-effort delivery with a per-shard retry buffer.
//!
//! # Flush order
//!
//! ```text
//!   flush(batch)
//!       │
//!       ├── retry buffer non-empty? ── send(buffer) ── ok: clear / err: keep as is
//!       │
//!       └── send(batch) ── ok: drop / err: append to retry buffer
//! ```
//!
//! Each send is a single attempt. A failed batch waits for the next flush instead of
//! being retried in a loop, so one slow endpoint cannot stall the shard. Every failure
//! kind (encode, transport, non-success status) is handled the same way.
//!
//! # Retention
//!
//! [`RetryBuffer::purge`] evicts every record whose own timestamp is older than the
//! cutoff, whether or not a send was attempted for it. This is the only path on which
//! events are lost without being delivered, and it bounds the buffer during a
//! sustained outage.

use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::event::Event;
use crate::sink::Sink;
use crate::stats::Stats;

#[derive(Debug)]
pub struct RetryBuffer {
    shard: usize,
    events: Vec<Event>,
    stats: Arc<Stats>,
}

impl RetryBuffer {
    #[must_use]
    pub fn new(shard: usize, stats: Arc<Stats>) -> Self {
        RetryBuffer {
            shard,
            events: Vec::new(),
            stats,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Sends the retry buffer (if any) and then `batch`, keeping whatever fails.
    pub async fn flush(&mut self, sink: &dyn Sink, batch: Vec<Event>) {
        if !self.events.is_empty() {
            debug!(
                "SEQ | shard {}: retrying {} previously failed events",
                self.shard,
                self.events.len()
            );
            match sink.send(&self.events).await {
                Ok(()) => {
                    self.stats.record_sent(self.events.len());
                    self.events.clear();
                }
                Err(e) => {
                    self.stats.record_failed_attempt();
                    debug!("SEQ | shard {}: retry attempt failed: {}", self.shard, e);
                }
            }
        }

        if batch.is_empty() {
            return;
        }
        match sink.send(&batch).await {
            Ok(()) => self.stats.record_sent(batch.len()),
            Err(e) => {
                self.stats.record_failed_attempt();
                debug!(
                    "SEQ | shard {}: failed to send {} events, will retry later: {}",
                    self.shard,
                    batch.len(),
                    e
                );
                self.events.extend(batch);
            }
        }
    }

    /// Drops every buffered record older than `cutoff`. Returns how many were dropped.
    pub fn purge(&mut self, cutoff: OffsetDateTime) -> usize {
        let before = self.events.len();
        self.events.retain(|e| e.timestamp >= cutoff);
        let purged = before - self.events.len();
        if purged > 0 {
            self.stats.record_purged(purged);
            warn!(
                "SEQ | shard {}: dropped {} undelivered events older than the retention window",
                self.shard, purged
            );
        }
        purged
    }
}
