//! Barrier batches: launch one task per item, settle all, keep launch order

use crate::errors::AppError;
use crate::model::Settled;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::time::Duration;

/// Limits applied to every task in a batch
#[derive(Debug, Clone, Copy)]
pub struct BatchLimits {
    /// Upper bound for a single task
    pub call_timeout: Duration,

    /// Tasks allowed to run at once; `None` runs the whole batch together
    pub max_in_flight: Option<usize>,
}

/// Run `op` over every item concurrently and wait for all of them to settle.
///
/// `op` turns an item into the key its outcome is reported under plus the
/// future doing the work. A failing or timed-out task yields an `Err`
/// outcome in its own slot and never cancels its siblings. Outcomes come
/// back ordered by launch index, whatever order the tasks finished in.
pub async fn fan_out<I, K, T, F, Fut>(
    stage: &'static str,
    items: Vec<I>,
    limits: BatchLimits,
    op: F,
) -> Vec<Settled<K, T>>
where
    F: Fn(I) -> (K, Fut),
    Fut: Future<Output = crate::errors::Result<T>>,
{
    let timeout_ms = limits.call_timeout.as_millis() as u64;

    let tasks = items.into_iter().enumerate().map(|(index, item)| {
        let (key, work) = op(item);
        async move {
            let outcome = match tokio::time::timeout(limits.call_timeout, work).await {
                Ok(outcome) => outcome,
                Err(_) => Err(AppError::Timeout {
                    operation: stage.to_string(),
                    timeout_ms,
                }),
            };
            Settled { index, key, outcome }
        }
    });

    let mut settled: Vec<Settled<K, T>> = match limits.max_in_flight {
        Some(limit) => stream::iter(tasks).buffered(limit.max(1)).collect().await,
        None => futures::future::join_all(tasks).await,
    };

    settled.sort_by_key(|s| s.index);
    settled
}
