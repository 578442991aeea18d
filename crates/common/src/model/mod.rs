//! Request-scoped entities flowing through the answer pipeline

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// A single web search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Absolute http(s) URL of the result
    pub url: Url,

    pub title: String,

    pub snippet: String,

    /// Human-readable URL as shown by the search engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_url: Option<String>,
}

impl Hit {
    /// Build a hit, rejecting anything that is not an absolute http(s) URL
    pub fn new(url: &str, title: impl Into<String>, snippet: impl Into<String>) -> Result<Self> {
        Ok(Self {
            url: parse_absolute_url(url)?,
            title: title.into(),
            snippet: snippet.into(),
            display_url: None,
        })
    }
}

/// Parse an absolute http(s) URL
pub fn parse_absolute_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        AppError::validation(format!("invalid url '{raw}': {e}"), Some("url"))
    })?;

    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(AppError::validation(
            format!("url '{raw}' is not an absolute http(s) url"),
            Some("url"),
        )),
    }
}

/// Sanitized page text tagged with the URL it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub url: Url,
    pub text: String,
}

/// Raw extractor output before candidate filtering
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    #[serde(default)]
    pub answer: Option<String>,

    /// Confidence in [0, 1]
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl Extraction {
    pub fn new(answer: impl Into<String>, confidence: f64) -> Self {
        Self {
            answer: Some(answer.into()),
            confidence: Some(confidence),
        }
    }

    /// Promote to a candidate when the answer is non-empty and the confidence is a number
    pub fn into_candidate(self, source_url: &Url) -> Option<Candidate> {
        let answer = self.answer?;
        let confidence = self.confidence.filter(|c| c.is_finite())?;

        if answer.trim().is_empty() {
            return None;
        }

        Some(Candidate {
            answer,
            confidence,
            source_url: source_url.to_string(),
        })
    }
}

/// A surviving answer with attribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub answer: String,
    pub confidence: f64,
    pub source_url: String,
}

/// Candidates ordered by confidence, highest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedResultSet(Vec<Candidate>);

impl RankedResultSet {
    /// Wrap candidates that are already ranked
    pub(crate) fn from_ranked(candidates: Vec<Candidate>) -> Self {
        Self(candidates)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.0.iter()
    }
}

/// Outcome of one task in a fan-out batch, tagged with the position and key it was launched with
#[derive(Debug)]
pub struct Settled<K, T> {
    /// Launch position within the batch
    pub index: usize,
    pub key: K,
    pub outcome: Result<T>,
}

impl<K, T> Settled<K, T> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://example.com/paris").unwrap()
    }

    #[test]
    fn test_hit_requires_absolute_http_url() {
        assert!(Hit::new("https://example.com/a", "A", "").is_ok());
        assert!(Hit::new("example.com/a", "A", "").is_err());
        assert!(Hit::new("ftp://example.com/a", "A", "").is_err());
        assert!(Hit::new("mailto:someone@example.com", "A", "").is_err());
    }

    #[test]
    fn test_extraction_becomes_candidate() {
        let candidate = Extraction::new("Paris", 0.8).into_candidate(&url()).unwrap();
        assert_eq!(candidate.answer, "Paris");
        assert_eq!(candidate.confidence, 0.8);
        assert_eq!(candidate.source_url, "https://example.com/paris");
    }

    #[test]
    fn test_empty_answer_is_discarded() {
        assert!(Extraction::new("", 0.9).into_candidate(&url()).is_none());
        assert!(Extraction::new("   ", 0.9).into_candidate(&url()).is_none());
    }

    #[test]
    fn test_missing_or_non_numeric_confidence_is_discarded() {
        let missing = Extraction { answer: Some("Paris".into()), confidence: None };
        assert!(missing.into_candidate(&url()).is_none());
        assert!(Extraction::new("Paris", f64::NAN).into_candidate(&url()).is_none());
    }

    #[test]
    fn test_zero_confidence_is_kept() {
        let candidate = Extraction::new("Paris", 0.0).into_candidate(&url());
        assert!(candidate.is_some());
    }

    #[test]
    fn test_ranked_set_serializes_as_array() {
        let set = RankedResultSet::from_ranked(vec![Candidate {
            answer: "Paris".into(),
            confidence: 0.8,
            source_url: "https://example.com/".into(),
        }]);
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                { "answer": "Paris", "confidence": 0.8, "source_url": "https://example.com/" }
            ])
        );
    }
}
