// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fan-out from producer threads to shard queues.
//!
//! [`Dispatcher::submit`] makes a single `try_send` on the selected shard's bounded
//! queue and returns. A full queue means the event is dropped and counted: producers are
//! never stalled by a slow or unreachable sink, and the logging call itself never fails.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::event::Event;
use crate::stats::Stats;

#[derive(Debug)]
pub struct Dispatcher {
    senders: Vec<mpsc::Sender<Event>>,
    next: AtomicUsize,
    closed: AtomicBool,
    stats: Arc<Stats>,
}

impl Dispatcher {
    /// Creates `shards` bounded queues of `capacity` events each.
    ///
    /// Returns the receivers in shard order; each must be handed to exactly one worker.
    #[must_use]
    pub fn new(
        shards: usize,
        capacity: usize,
        stats: Arc<Stats>,
    ) -> (Self, Vec<mpsc::Receiver<Event>>) {
        let (senders, receivers) = (0..shards.max(1))
            .map(|_| mpsc::channel(capacity.max(1)))
            .unzip();
        let dispatcher = Dispatcher {
            senders,
            next: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            stats,
        };
        (dispatcher, receivers)
    }

    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.senders.len()
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Enqueues `event` on the next shard in round-robin order, or drops it.
    pub fn submit(&self, event: Event) {
        if self.is_closed() {
            self.stats.record_dropped();
            return;
        }
        let shard = if self.senders.len() == 1 {
            0
        } else {
            self.next.fetch_add(1, Ordering::Relaxed) % self.senders.len()
        };
        match self.senders[shard].try_send(event) {
            Ok(()) => self.stats.record_submitted(),
            Err(TrySendError::Full(_)) => {
                self.stats.record_dropped();
                debug!("SEQ | shard {} queue is full, dropping event", shard);
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.record_dropped();
                debug!("SEQ | shard {} has stopped, dropping event", shard);
            }
        }
    }

    /// Stops accepting submissions. Queued events are left for the workers to drain.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
