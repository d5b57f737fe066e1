// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pipeline counters.
//!
//! Shared by the dispatcher and every shard worker. All updates are relaxed atomic
//! increments; a [`StatsSnapshot`] is a point-in-time read, not a consistent cut.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Stats {
    submitted: AtomicU64,
    dropped: AtomicU64,
    sent: AtomicU64,
    failed_attempts: AtomicU64,
    purged: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Events accepted into a shard queue.
    pub submitted: u64,
    /// Events discarded because their queue was full or the pipeline was closing.
    pub dropped: u64,
    /// Events delivered to the sink.
    pub sent: u64,
    /// Send attempts that failed (one per batch or retry-buffer attempt).
    pub failed_attempts: u64,
    /// Events evicted from retry buffers after the purge window.
    pub purged: u64,
}

impl Stats {
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self, count: usize) {
        self.sent.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_attempt(&self) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_purged(&self, count: usize) {
        self.purged.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
        }
    }
}
