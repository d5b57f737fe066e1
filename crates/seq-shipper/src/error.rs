// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors surfaced while configuring, starting or stopping the shipper.
///
/// None of these reach a logging call site; delivery failures use [`SendError`] and
/// are absorbed by the retry buffer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("No tokio runtime available to spawn shard workers")]
    NoRuntime,

    #[error("Shutdown timeout exceeded")]
    ShutdownTimeout,

    #[error("A default handler is already installed")]
    AlreadyInitialized,
}

/// Why a single delivery attempt failed.
///
/// The retry buffer treats every variant the same way: the batch is kept for a later
/// attempt.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("ingestion endpoint rejected batch with status {status}")]
    Rejected { status: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = Error::InvalidConfig("batch size must be at least 1".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid configuration: batch size must be at least 1"
        );
        assert_eq!(Error::ShutdownTimeout.to_string(), "Shutdown timeout exceeded");
    }

    #[test]
    fn test_send_error_display() {
        let error = SendError::Rejected { status: 503 };
        assert_eq!(
            error.to_string(),
            "ingestion endpoint rejected batch with status 503"
        );
    }

    #[test]
    fn test_encode_error_converts() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: SendError = json_err.into();
        assert!(matches!(error, SendError::Encode(_)));
    }
}
