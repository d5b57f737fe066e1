// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use core::time::Duration;
use tracing::warn;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Builds the HTTP client used by the sink when no custom client is configured.
///
/// Proxies are taken from the environment (`HTTPS_PROXY` and friends), as reqwest does
/// by default. `timeout` bounds each request end to end, which also bounds how long a
/// shard can spend draining on shutdown.
pub fn build_client(
    insecure_skip_verify: bool,
    timeout: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_idle_timeout(Some(POOL_IDLE_TIMEOUT));

    if insecure_skip_verify {
        warn!("SEQ | TLS certificate verification is disabled");
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_default() {
        assert!(build_client(false, Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_build_client_insecure() {
        assert!(build_client(true, Duration::from_secs(5)).is_ok());
    }
}
