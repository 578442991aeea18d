//! AnswerForge Common Library
//!
//! Shared code for the AnswerForge gateway including:
//! - Request-scoped entities (hits, documents, candidates)
//! - Generation, search and fetch collaborators
//! - The fan-out answer pipeline and ranking
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod fetch;
pub mod generation;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod retry;
pub mod search;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use model::{Candidate, RankedResultSet};
pub use pipeline::{Orchestrator, PipelineReport};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
