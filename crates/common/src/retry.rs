//! Retry with exponential backoff for upstream calls

use crate::errors::Result;
use std::future::Future;
use std::time::Duration;

/// Base delay; attempt `n` waits `BASE_DELAY_MS * 2^n`
const BASE_DELAY_MS: u64 = 100;

/// Ceiling for a single backoff sleep
const MAX_DELAY_MS: u64 = 10_000;

/// Backoff before retry number `attempt`
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2_u64.checked_pow(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(BASE_DELAY_MS.saturating_mul(factor).min(MAX_DELAY_MS))
}

/// Run `call` until it succeeds, fails with a non-retryable error, or `max_retries` is spent
///
/// Callers wrapped in an outer timeout (the pipeline's per-call bound) lose
/// whatever retries have not finished when it fires.
pub async fn with_retry<T, F, Fut>(operation: &str, max_retries: u32, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_retries && e.is_retryable() => {
                attempt += 1;
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    operation = operation,
                    attempt = attempt,
                    max_retries = max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Upstream call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
