//! Per-request diagnostics for logging and metrics

use crate::errors::AppError;
use crate::model::Settled;
use serde::Serialize;

/// Counts for one fan-out stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Subset of `failed` that hit the call timeout
    pub timed_out: usize,
    pub elapsed_ms: u64,
}

impl StageStats {
    pub(crate) fn from_settled<K, T>(settled: &[Settled<K, T>], elapsed_ms: u64) -> Self {
        let mut stats = StageStats {
            attempted: settled.len(),
            elapsed_ms,
            ..Self::default()
        };

        for item in settled {
            match &item.outcome {
                Ok(_) => stats.succeeded += 1,
                Err(AppError::Timeout { .. }) => {
                    stats.failed += 1;
                    stats.timed_out += 1;
                }
                Err(_) => stats.failed += 1,
            }
        }

        stats
    }
}

/// What happened to one query on its way through the pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineReport {
    pub terms: usize,
    /// Hits left after per-term truncation and flattening
    pub hits: usize,
    pub search: StageStats,
    pub fetch: StageStats,
    pub extract: StageStats,
    /// Extractions dropped for an empty answer or missing confidence
    pub discarded: usize,
    pub candidates: usize,
    pub elapsed_ms: u64,
}
