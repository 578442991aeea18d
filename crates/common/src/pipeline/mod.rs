//! Answer pipeline: term generation, search, fetch, extraction and ranking

mod fan_out;
mod orchestrator;
mod ranker;
mod report;

pub use fan_out::{fan_out, BatchLimits};
pub use orchestrator::{Orchestrator, OrchestratorOptions};
pub use ranker::rank;
pub use report::{PipelineReport, StageStats};
