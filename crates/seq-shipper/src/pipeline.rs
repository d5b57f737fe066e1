// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Owner of the shard workers and their shutdown.
//!
//! # Lifecycle
//!
//! 1. [`Pipeline::start`] (or [`Pipeline::with_sink`]) validates the config, creates one
//!    bounded queue per shard and spawns a worker for each on the current tokio runtime.
//! 2. Producers log through [`Pipeline::handler`], [`Pipeline::layer`] or
//!    [`Pipeline::span_processor`]. All of them are cheap clones that stay usable after
//!    the pipeline is closed; their events are then dropped and counted.
//! 3. [`Pipeline::close`] waits a short grace period for in-flight producer calls, stops
//!    accepting events, signals every shard to drain and waits until all have stopped.
//!
//! `close` takes the pipeline by value, so it cannot run twice. Dropping a pipeline
//! without closing it signals the shards to drain but does not wait for them.

use core::time::Duration;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::handler::SeqHandler;
use crate::http::build_client;
use crate::layer::SeqLayer;
use crate::shard::Shard;
use crate::sink::{HttpSink, Sink};
use crate::spans::LoggingSpanProcessor;
use crate::stats::{Stats, StatsSnapshot};

pub struct Pipeline {
    handler: SeqHandler,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<Stats>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<usize>>,
    shutdown_grace: Duration,
}

impl Pipeline {
    /// Starts a pipeline that posts to `config.url`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: Config) -> Result<Self, Error> {
        config.validate()?;
        let client = match config.client.clone() {
            Some(client) => client,
            None => build_client(config.insecure_skip_verify, config.request_timeout)?,
        };
        let sink = HttpSink::new(client, config.url.clone(), config.api_key.as_deref())?;
        Self::with_sink(config, Arc::new(sink))
    }

    /// Starts a pipeline that delivers to `sink`. Connection settings in `config` are
    /// not used.
    pub fn with_sink(config: Config, sink: Arc<dyn Sink>) -> Result<Self, Error> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let stats = Arc::new(Stats::default());
        let (dispatcher, receivers) =
            Dispatcher::new(config.workers, config.queue_capacity, Arc::clone(&stats));
        let dispatcher = Arc::new(dispatcher);
        let cancel = CancellationToken::new();
        let settings = config.batch_settings();

        let workers = receivers
            .into_iter()
            .enumerate()
            .map(|(id, rx)| {
                let shard = Shard::new(
                    id,
                    rx,
                    Arc::clone(&sink),
                    settings,
                    Arc::clone(&stats),
                    cancel.clone(),
                );
                runtime.spawn(shard.run())
            })
            .collect::<Vec<_>>();
        debug!(
            "SEQ | Started {} shard(s): batch size {}, flush interval {:?}, purge window {:?}",
            workers.len(),
            settings.batch_size,
            settings.flush_interval,
            settings.purge_window
        );

        let handler = SeqHandler::new(Arc::clone(&dispatcher), config.handler_options());
        Ok(Pipeline {
            handler,
            dispatcher,
            stats,
            cancel,
            workers,
            shutdown_grace: config.shutdown_grace,
        })
    }

    #[must_use]
    pub fn handler(&self) -> SeqHandler {
        self.handler.clone()
    }

    #[must_use]
    pub fn layer(&self) -> SeqLayer {
        SeqLayer::new(self.handler.clone())
    }

    #[must_use]
    pub fn span_processor(&self) -> LoggingSpanProcessor {
        LoggingSpanProcessor::new(self.handler.clone())
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Drains every shard and waits for all of them to stop.
    pub async fn close(mut self) {
        self.shutdown().await;
    }

    /// Like [`Pipeline::close`], but gives up after `timeout`.
    ///
    /// On timeout the shards keep draining in the background.
    pub async fn close_with_timeout(mut self, timeout: Duration) -> Result<(), Error> {
        tokio::time::timeout(timeout, self.shutdown())
            .await
            .map_err(|_| Error::ShutdownTimeout)
    }

    async fn shutdown(&mut self) {
        tokio::time::sleep(self.shutdown_grace).await;
        self.dispatcher.close();
        self.cancel.cancel();

        let mut undelivered = 0;
        for (id, worker) in std::mem::take(&mut self.workers).into_iter().enumerate() {
            match worker.await {
                Ok(remaining) => undelivered += remaining,
                Err(e) => error!("SEQ | shard {} worker failed: {}", id, e),
            }
        }

        let stats = self.stats.snapshot();
        if undelivered > 0 {
            warn!(
                "SEQ | Closed with {} undelivered events ({} sent, {} dropped)",
                undelivered, stats.sent, stats.dropped
            );
        } else {
            debug!(
                "SEQ | Closed ({} sent, {} dropped, {} purged)",
                stats.sent, stats.dropped, stats.purged
            );
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.dispatcher.close();
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SendError;
    use crate::event::Event;
    use crate::handler::{Level, Record};
    use crate::test_support::ScriptedSink;
    use async_trait::async_trait;

    fn config() -> Config {
        Config::new("http://localhost:5341/ingest/clef")
            .with_flush_interval(Duration::from_secs(3600))
            .with_batch_size(100)
    }

    struct HangingSink;

    #[async_trait]
    impl Sink for HangingSink {
        async fn send(&self, _events: &[Event]) -> Result<(), SendError> {
            std::future::pending().await
        }
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let (sink, _rx) = ScriptedSink::succeeding();
        let result = Pipeline::with_sink(config(), sink);
        assert!(matches!(result, Err(Error::NoRuntime)));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let (sink, _rx) = ScriptedSink::succeeding();
        let result = Pipeline::with_sink(config().with_workers(0), sink);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_close_delivers_all_queued_events_in_order() {
        let (sink, _rx) = ScriptedSink::succeeding();
        let pipeline = Pipeline::with_sink(config(), sink.clone()).unwrap();
        let handler = pipeline.handler();

        let expected: Vec<String> = (0..25).map(|i| format!("event {i}")).collect();
        for m in &expected {
            handler.handle(Record::new(Level::INFO, m.clone()));
        }
        pipeline.close().await;

        assert_eq!(sink.delivered_messages(), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_drains_every_shard_in_order() {
        let (sink, _rx) = ScriptedSink::succeeding();
        let config = config().with_workers(3).with_batch_size(4);
        let pipeline = Pipeline::with_sink(config, sink.clone()).unwrap();
        let handler = pipeline.handler();

        for i in 0..30 {
            handler.handle(Record::new(Level::INFO, i.to_string()));
        }
        pipeline.close().await;

        let mut delivered: Vec<u32> = sink
            .delivered_messages()
            .iter()
            .map(|m| m.parse().unwrap())
            .collect();
        for attempt in sink.attempts() {
            let ids: Vec<u32> = attempt.messages.iter().map(|m| m.parse().unwrap()).collect();
            assert!(ids.windows(2).all(|w| w[0] < w[1] && w[0] % 3 == w[1] % 3));
        }
        delivered.sort_unstable();
        assert_eq!(delivered, (0..30).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_events_after_close_are_dropped() {
        let (sink, _rx) = ScriptedSink::succeeding();
        let pipeline = Pipeline::with_sink(config(), sink.clone()).unwrap();
        let handler = pipeline.handler();

        handler.handle(Record::new(Level::INFO, "kept"));
        pipeline.close().await;
        handler.handle(Record::new(Level::INFO, "late"));

        assert_eq!(sink.delivered_messages(), vec!["kept"]);
        let stats = handler.stats();
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_with_timeout_gives_up_on_stuck_sink() {
        let pipeline = Pipeline::with_sink(config(), Arc::new(HangingSink)).unwrap();
        pipeline
            .handler()
            .handle(Record::new(Level::INFO, "never sent"));

        let result = pipeline.close_with_timeout(Duration::from_secs(1)).await;

        assert!(matches!(result, Err(Error::ShutdownTimeout)));
    }

    #[tokio::test]
    async fn test_close_with_timeout_succeeds_when_sink_is_healthy() {
        let (sink, _rx) = ScriptedSink::succeeding();
        let pipeline = Pipeline::with_sink(config(), sink.clone()).unwrap();
        pipeline.handler().handle(Record::new(Level::INFO, "a"));

        assert!(pipeline
            .close_with_timeout(Duration::from_secs(5))
            .await
            .is_ok());
        assert_eq!(sink.delivered_messages(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_drop_drains_in_background() {
        let (sink, mut attempts) = ScriptedSink::succeeding();
        let pipeline = Pipeline::with_sink(config(), sink).unwrap();
        pipeline.handler().handle(Record::new(Level::INFO, "orphan"));

        drop(pipeline);

        let attempt = attempts.recv().await.unwrap();
        assert_eq!(attempt.messages, vec!["orphan"]);
    }

    #[tokio::test]
    async fn test_stats_snapshot() {
        let (sink, _rx) = ScriptedSink::succeeding();
        let pipeline = Pipeline::with_sink(config().with_queue_capacity(2), sink).unwrap();
        let handler = pipeline.handler();

        for m in ["a", "b", "c"] {
            handler.handle(Record::new(Level::INFO, m));
        }

        let stats = pipeline.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.dropped, 1);
        pipeline.close().await;
    }
}
