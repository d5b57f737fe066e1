// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery targets for encoded batches.
//!
//! A [`Sink`] performs exactly one delivery attempt per call. It never retries on its
//! own; retrying is the job of the shard's retry buffer, which keeps the flush path from
//! blocking on a slow or unreachable endpoint.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::time::Instant;
use tracing::debug;

use crate::clef;
use crate::error::{Error, SendError};
use crate::event::Event;

pub const API_KEY_HEADER: &str = "X-Seq-ApiKey";

#[async_trait]
pub trait Sink: Send + Sync {
    /// Makes one attempt to deliver `events` as a single request.
    async fn send(&self, events: &[Event]) -> Result<(), SendError>;
}

/// Posts newline-delimited CLEF to an ingestion URL.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
}

impl HttpSink {
    pub fn new(client: reqwest::Client, url: String, api_key: Option<&str>) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(clef::CONTENT_TYPE));
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            let mut value = HeaderValue::from_str(key)
                .map_err(|_| Error::InvalidConfig("API key is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }
        Ok(HttpSink {
            client,
            url,
            headers,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn send(&self, events: &[Event]) -> Result<(), SendError> {
        if events.is_empty() {
            return Ok(());
        }
        let body = clef::encode_batch(events)?;

        let time = Instant::now();
        let resp = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await?;
        let status = resp.status();

        if !status.is_success() {
            return Err(SendError::Rejected {
                status: status.as_u16(),
            });
        }
        debug!(
            "SEQ | Sent {} events in {} ms",
            events.len(),
            time.elapsed().as_millis()
        );
        Ok(())
    }
}
