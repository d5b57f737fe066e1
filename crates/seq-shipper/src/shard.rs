// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-shard batch accumulator.
//!
//! ```text
//!            event / flush tick             batch full, or tick with batch > 0
//!   ┌──────────────┐ ───────────────────▶ ┌──────────┐
//!   │ ACCUMULATING │                      │ FLUSHING │
//!   └──────────────┘ ◀─────────────────── └──────────┘
//!          │ cancelled / queue closed
//!          ▼
//!   ┌──────────┐   retry buffer, then final batch   ┌─────────┐
//!   │ DRAINING │ ─────────────────────────────────▶ │ STOPPED │
//!   └──────────┘                                    └─────────┘
//! ```
//!
//! The purge timer runs alongside and never touches the current batch.

use core::time::Duration;
use std::fmt;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::event::Event;
use crate::retry::RetryBuffer;
use crate::sink::Sink;
use crate::stats::Stats;

const MIN_PERIOD: Duration = Duration::from_millis(1);
// Keeps `Instant + period` from overflowing in the timers.
const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardState {
    Accumulating,
    Flushing,
    Draining,
    Stopped,
}

impl fmt::Display for ShardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShardState::Accumulating => "ACCUMULATING",
            ShardState::Flushing => "FLUSHING",
            ShardState::Draining => "DRAINING",
            ShardState::Stopped => "STOPPED",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub flush_interval: Duration,
    /// Maximum age of a retry-buffer entry; also the purge timer period.
    pub purge_window: Duration,
}

pub struct Shard {
    id: usize,
    rx: mpsc::Receiver<Event>,
    sink: Arc<dyn Sink>,
    settings: BatchSettings,
    batch: Vec<Event>,
    retry: RetryBuffer,
    state: ShardState,
    cancel: CancellationToken,
}

impl Shard {
    #[must_use]
    pub fn new(
        id: usize,
        rx: mpsc::Receiver<Event>,
        sink: Arc<dyn Sink>,
        settings: BatchSettings,
        stats: Arc<Stats>,
        cancel: CancellationToken,
    ) -> Self {
        let settings = BatchSettings {
            batch_size: settings.batch_size.max(1),
            flush_interval: settings.flush_interval.clamp(MIN_PERIOD, MAX_PERIOD),
            purge_window: settings.purge_window.clamp(MIN_PERIOD, MAX_PERIOD),
        };
        Shard {
            id,
            rx,
            sink,
            batch: Vec::with_capacity(settings.batch_size),
            settings,
            retry: RetryBuffer::new(id, stats),
            state: ShardState::Accumulating,
            cancel,
        }
    }

    /// Runs until cancelled or until every sender is gone, then drains.
    ///
    /// Returns the number of events still undelivered after the final attempt.
    pub async fn run(mut self) -> usize {
        let mut flush_tick = interval(self.settings.flush_interval);
        flush_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        flush_tick.tick().await; // discard first tick

        let mut purge_tick = interval(self.settings.purge_window);
        purge_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        purge_tick.tick().await;

        debug!("SEQ | shard {}: {}", self.id, self.state);
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                received = self.rx.recv() => {
                    let Some(event) = received else { break };
                    self.batch.push(event);
                    if self.batch.len() >= self.settings.batch_size {
                        self.flush().await;
                    }
                }
                _ = flush_tick.tick() => {
                    if !self.batch.is_empty() {
                        self.flush().await;
                    }
                }
                _ = purge_tick.tick() => self.purge(),
            }
        }

        self.drain().await
    }

    async fn flush(&mut self) {
        self.transition(ShardState::Flushing);
        let batch = std::mem::replace(
            &mut self.batch,
            Vec::with_capacity(self.settings.batch_size),
        );
        self.retry.flush(self.sink.as_ref(), batch).await;
        self.transition(ShardState::Accumulating);
    }

    fn purge(&mut self) {
        let Ok(window) = time::Duration::try_from(self.settings.purge_window) else {
            return;
        };
        if let Some(cutoff) = OffsetDateTime::now_utc().checked_sub(window) {
            self.retry.purge(cutoff);
        }
    }

    async fn drain(mut self) -> usize {
        self.transition(ShardState::Draining);
        self.rx.close();
        while let Some(event) = self.rx.recv().await {
            self.batch.push(event);
            if self.batch.len() >= self.settings.batch_size {
                let batch = std::mem::take(&mut self.batch);
                self.retry.flush(self.sink.as_ref(), batch).await;
            }
        }
        let batch = std::mem::take(&mut self.batch);
        self.retry.flush(self.sink.as_ref(), batch).await;

        self.transition(ShardState::Stopped);
        self.retry.len()
    }

    fn transition(&mut self, next: ShardState) {
        if self.state != next {
            debug!("SEQ | shard {}: {} -> {}", self.id, self.state, next);
            self.state = next;
        }
    }
}
