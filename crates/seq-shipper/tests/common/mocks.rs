// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory sink implementations

use async_trait::async_trait;
use seq_shipper::{Event, SendError, Sink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// One call to `send`, with the messages it carried
#[derive(Debug, Clone)]
pub struct SentBatch {
    pub messages: Vec<String>,
    pub events: Vec<Event>,
    pub delivered: bool,
}

/// Sink that fails the first `failures` sends and records every attempt
pub struct RecordingSink {
    failures_remaining: AtomicUsize,
    batches: Mutex<Vec<SentBatch>>,
    tx: UnboundedSender<SentBatch>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> (Self, UnboundedReceiver<SentBatch>) {
        Self::failing_first(0)
    }

    pub fn failing_first(failures: usize) -> (Self, UnboundedReceiver<SentBatch>) {
        let (tx, rx) = unbounded_channel();
        let sink = RecordingSink {
            failures_remaining: AtomicUsize::new(failures),
            batches: Mutex::new(Vec::new()),
            tx,
        };
        (sink, rx)
    }

    pub fn batches(&self) -> Vec<SentBatch> {
        self.batches.lock().unwrap().clone()
    }

    /// Messages of every delivered batch, in delivery order
    pub fn delivered(&self) -> Vec<String> {
        self.batches()
            .into_iter()
            .filter(|b| b.delivered)
            .flat_map(|b| b.messages)
            .collect()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn send(&self, events: &[Event]) -> Result<(), SendError> {
        let failed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let batch = SentBatch {
            messages: events.iter().map(|e| e.message.clone()).collect(),
            events: events.to_vec(),
            delivered: !failed,
        };
        self.batches.lock().unwrap().push(batch.clone());
        let _ = self.tx.send(batch);

        if failed {
            Err(SendError::Rejected { status: 500 })
        } else {
            Ok(())
        }
    }
}
