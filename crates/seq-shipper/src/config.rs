// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use core::time::Duration;
use std::env;
use std::fmt;

use crate::error::Error;
use crate::handler::{Attr, HandlerOptions, Level, Redactor, DEFAULT_SOURCE_KEY};
use crate::shard::BatchSettings;

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(2);
/// Shortest flush interval the shard timers can honour.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);
pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Retry-buffer entries older than this many flush intervals are purged.
pub const DEFAULT_PURGE_MULTIPLIER: u32 = 60;
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(50);

/// Shipper configuration
#[derive(Clone)]
pub struct Config {
    /// Ingestion endpoint, e.g. `http://localhost:5341/ingest/clef`
    pub url: String,
    /// Sent as `X-Seq-ApiKey` when set
    pub api_key: Option<String>,
    /// Events per request
    pub batch_size: usize,
    /// Maximum time an event waits in a partial batch; at least [`MIN_FLUSH_INTERVAL`]
    pub flush_interval: Duration,
    /// Number of shards, each with its own queue and worker
    pub workers: usize,
    /// Events each shard queue holds before new ones are dropped
    pub queue_capacity: usize,
    /// Skip TLS certificate verification
    pub insecure_skip_verify: bool,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Records below this level are ignored
    pub min_level: Level,
    /// Attach the call site to each log event
    pub add_source: bool,
    /// Property name for the call site
    pub source_key: String,
    pub purge_multiplier: u32,
    /// Delay before `close` stops accepting events
    pub shutdown_grace: Duration,
    /// Used instead of building a client; TLS and timeout options are then ignored
    pub client: Option<reqwest::Client>,
    pub global_attrs: Vec<Attr>,
    pub redactor: Option<Redactor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: None,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            insecure_skip_verify: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            min_level: Level::INFO,
            add_source: false,
            source_key: DEFAULT_SOURCE_KEY.to_string(),
            purge_multiplier: DEFAULT_PURGE_MULTIPLIER,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            client: None,
            global_attrs: Vec::new(),
            redactor: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("batch_size", &self.batch_size)
            .field("flush_interval", &self.flush_interval)
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("request_timeout", &self.request_timeout)
            .field("min_level", &self.min_level)
            .field("add_source", &self.add_source)
            .field("source_key", &self.source_key)
            .field("purge_multiplier", &self.purge_multiplier)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("client", &self.client.is_some())
            .field("global_attrs", &self.global_attrs)
            .field("redactor", &self.redactor.is_some())
            .finish()
    }
}

impl Config {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// Unparseable numbers and booleans fall back to their defaults; an unknown
    /// `SEQ_LEVEL` or a missing `SEQ_URL` is an error.
    pub fn from_env() -> Result<Self, Error> {
        let url = env::var("SEQ_URL").unwrap_or_default();
        let api_key = env::var("SEQ_API_KEY").ok().filter(|k| !k.is_empty());
        let batch_size = env_parse("SEQ_BATCH_SIZE").unwrap_or(DEFAULT_BATCH_SIZE);
        let flush_interval = env_parse("SEQ_FLUSH_INTERVAL_MS")
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_FLUSH_INTERVAL);
        let workers = env_parse("SEQ_WORKERS").unwrap_or(DEFAULT_WORKERS);
        let queue_capacity = env_parse("SEQ_QUEUE_CAPACITY").unwrap_or(DEFAULT_QUEUE_CAPACITY);
        let insecure_skip_verify = env_bool("SEQ_INSECURE").unwrap_or(false);
        let request_timeout = env_parse("SEQ_REQUEST_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let min_level = match env::var("SEQ_LEVEL") {
            Ok(val) => val.parse::<Level>()?,
            Err(_) => Level::INFO,
        };
        let add_source = env_bool("SEQ_ADD_SOURCE").unwrap_or(false);
        let source_key = env::var("SEQ_SOURCE_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCE_KEY.to_string());

        let config = Self {
            url,
            api_key,
            batch_size,
            flush_interval,
            workers,
            queue_capacity,
            insecure_skip_verify,
            request_timeout,
            min_level,
            add_source,
            source_key,
            ..Default::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Error> {
        if self.url.trim().is_empty() {
            return Err(Error::InvalidConfig("ingestion URL cannot be empty".to_string()));
        }
        let url = reqwest::Url::parse(&self.url).map_err(|e| {
            Error::InvalidConfig(format!("invalid ingestion URL '{}': {e}", self.url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "ingestion URL must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be greater than 0".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("worker count must be greater than 0".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfig("queue capacity must be greater than 0".to_string()));
        }
        if self.flush_interval < MIN_FLUSH_INTERVAL {
            return Err(Error::InvalidConfig(format!(
                "flush interval must be at least {MIN_FLUSH_INTERVAL:?}, got {:?}",
                self.flush_interval
            )));
        }
        if self.purge_multiplier == 0 {
            return Err(Error::InvalidConfig("purge multiplier must be greater than 0".to_string()));
        }
        if self.source_key.trim().is_empty() {
            return Err(Error::InvalidConfig("source key cannot be empty".to_string()));
        }

        Ok(())
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    #[must_use]
    pub fn with_insecure_skip_verify(mut self, insecure: bool) -> Self {
        self.insecure_skip_verify = insecure;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    #[must_use]
    pub fn with_source(mut self, key: impl Into<String>) -> Self {
        self.add_source = true;
        self.source_key = key.into();
        self
    }

    #[must_use]
    pub fn with_purge_multiplier(mut self, multiplier: u32) -> Self {
        self.purge_multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    #[must_use]
    pub fn with_global_attrs(mut self, attrs: impl IntoIterator<Item = Attr>) -> Self {
        self.global_attrs.extend(attrs);
        self
    }

    #[must_use]
    pub fn with_redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = Some(redactor);
        self
    }

    /// `flush_interval * purge_multiplier`, saturating.
    #[must_use]
    pub fn purge_window(&self) -> Duration {
        self.flush_interval
            .checked_mul(self.purge_multiplier)
            .unwrap_or(Duration::MAX)
    }

    #[must_use]
    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            batch_size: self.batch_size,
            flush_interval: self.flush_interval,
            purge_window: self.purge_window(),
        }
    }

    #[must_use]
    pub fn handler_options(&self) -> HandlerOptions {
        HandlerOptions {
            min_level: self.min_level,
            add_source: self.add_source,
            source_key: self.source_key.clone(),
            global_attrs: self.global_attrs.clone(),
            redactor: self.redactor.clone(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|val| val.trim().parse::<T>().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|val| matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
}
