// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Optional process-wide handler.
//!
//! Nothing in the pipeline depends on this slot. It exists for code that cannot have a
//! handler passed to it; everything else should hold a [`SeqHandler`] directly.

use std::sync::OnceLock;

use crate::error::Error;
use crate::handler::{Record, SeqHandler};

static DEFAULT_HANDLER: OnceLock<SeqHandler> = OnceLock::new();

/// Installs `handler` as the process-wide default. Can only succeed once.
pub fn set_default(handler: SeqHandler) -> Result<(), Error> {
    DEFAULT_HANDLER
        .set(handler)
        .map_err(|_| Error::AlreadyInitialized)
}

#[must_use]
pub fn default_handler() -> Option<&'static SeqHandler> {
    DEFAULT_HANDLER.get()
}

/// Handles `record` with the default handler, or drops it if none is installed.
pub fn log(record: Record) {
    if let Some(handler) = default_handler() {
        handler.handle(record);
    }
}
