// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory sinks for unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tokio::sync::mpsc;

use crate::error::SendError;
use crate::event::{ClefLevel, Event};
use crate::sink::Sink;

/// One call to [`ScriptedSink::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Attempt {
    pub messages: Vec<String>,
    pub delivered: bool,
}

/// Sink that fails a fixed number of times, then succeeds, recording every attempt.
pub(crate) struct ScriptedSink {
    failures_remaining: AtomicUsize,
    attempts: Mutex<Vec<Attempt>>,
    tx: mpsc::UnboundedSender<Attempt>,
}

impl ScriptedSink {
    pub fn new(failures: usize) -> (Arc<Self>, mpsc::UnboundedReceiver<Attempt>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Arc::new(ScriptedSink {
            failures_remaining: AtomicUsize::new(failures),
            attempts: Mutex::new(Vec::new()),
            tx,
        });
        (sink, rx)
    }

    pub fn succeeding() -> (Arc<Self>, mpsc::UnboundedReceiver<Attempt>) {
        Self::new(0)
    }

    pub fn always_failing() -> (Arc<Self>, mpsc::UnboundedReceiver<Attempt>) {
        Self::new(usize::MAX)
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn delivered_messages(&self) -> Vec<String> {
        self.attempts()
            .into_iter()
            .filter(|a| a.delivered)
            .flat_map(|a| a.messages)
            .collect()
    }
}

#[async_trait]
impl Sink for ScriptedSink {
    async fn send(&self, events: &[Event]) -> Result<(), SendError> {
        let failed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();

        let attempt = Attempt {
            messages: events.iter().map(|e| e.message.clone()).collect(),
            delivered: !failed,
        };
        self.attempts.lock().unwrap().push(attempt.clone());
        let _ = self.tx.send(attempt);

        if failed {
            Err(SendError::Rejected { status: 503 })
        } else {
            Ok(())
        }
    }
}

pub(crate) fn event_at(message: &str, timestamp: OffsetDateTime) -> Event {
    Event::new(timestamp, message, ClefLevel::Information)
}

pub(crate) fn event(message: &str) -> Event {
    event_at(message, OffsetDateTime::now_utc())
}
