//! Confidence ranking

use crate::model::{Candidate, RankedResultSet};

/// Order candidates by confidence, highest first.
///
/// The sort is stable: equal confidences keep the order the candidates
/// arrived in. `max_results` truncates after sorting; `None` keeps all.
pub fn rank(mut candidates: Vec<Candidate>, max_results: Option<usize>) -> RankedResultSet {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    if let Some(limit) = max_results {
        candidates.truncate(limit);
    }

    RankedResultSet::from_ranked(candidates)
}
