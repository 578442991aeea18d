//! Text-generation collaborators
//!
//! A single [`GenerationBackend`] turns a prompt plus a JSON schema into JSON text.
//! [`LlmClient`] wraps one shared backend and serves both pipeline roles:
//! - [`TermGenerator`]: query -> search terms
//! - [`AnswerExtractor`]: (page text, question) -> answer + confidence
//!
//! Backends hold no per-call mutable state, so one instance can be driven
//! concurrently from every task of a fan-out batch.

mod gemini;
mod openai;
mod prompts;

pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use crate::fetch::truncate_chars;
use crate::model::Extraction;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Schema-constrained text generation
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate JSON text conforming to `schema`
    async fn generate_json(&self, prompt: &str, schema: &Value) -> Result<String>;

    fn provider(&self) -> &'static str;

    fn model_name(&self) -> &str;
}

/// Produces search terms for a user query
#[async_trait]
pub trait TermGenerator: Send + Sync {
    async fn generate_terms(&self, query: &str) -> Result<Vec<String>>;
}

/// Extracts an answer and confidence from page text
#[async_trait]
pub trait AnswerExtractor: Send + Sync {
    async fn analyze(&self, content: &str, question: &str) -> Result<Extraction>;
}

/// Term generation and answer extraction over one shared backend
#[derive(Clone)]
pub struct LlmClient {
    backend: Arc<dyn GenerationBackend>,
    max_terms: usize,
    max_prompt_chars: usize,
}

impl LlmClient {
    pub fn new(backend: Arc<dyn GenerationBackend>, max_terms: usize, max_prompt_chars: usize) -> Self {
        Self {
            backend,
            max_terms: max_terms.max(1),
            max_prompt_chars,
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        Ok(Self::new(
            create_backend(config)?,
            config.max_search_terms,
            config.max_prompt_chars,
        ))
    }

    pub fn backend(&self) -> &Arc<dyn GenerationBackend> {
        &self.backend
    }
}

#[async_trait]
impl TermGenerator for LlmClient {
    #[tracing::instrument(skip(self), fields(provider = self.backend.provider()))]
    async fn generate_terms(&self, query: &str) -> Result<Vec<String>> {
        let prompt = prompts::search_terms_prompt(query, self.max_terms);
        let raw = self
            .backend
            .generate_json(&prompt, &prompts::search_terms_schema())
            .await?;

        parse_terms(&raw, self.max_terms)
    }
}

#[async_trait]
impl AnswerExtractor for LlmClient {
    #[tracing::instrument(skip(self, content), fields(provider = self.backend.provider(), content_chars = content.len()))]
    async fn analyze(&self, content: &str, question: &str) -> Result<Extraction> {
        let content = truncate_chars(content, self.max_prompt_chars);
        let prompt = prompts::analysis_prompt(content, question);
        let raw = self
            .backend
            .generate_json(&prompt, &prompts::analysis_schema())
            .await
            .map_err(into_extraction_error)?;

        parse_extraction(&raw)
    }
}

/// Backend failures during stage 4 surface as extraction errors
fn into_extraction_error(err: AppError) -> AppError {
    match err {
        AppError::Generation { message, retryable } => AppError::Extraction { message, retryable },
        other => other,
    }
}

/// Parse a JSON string array into trimmed, de-duplicated terms
fn parse_terms(raw: &str, max_terms: usize) -> Result<Vec<String>> {
    let terms: Vec<String> = serde_json::from_str(raw).map_err(|e| AppError::Generation {
        message: format!("search terms are not a JSON string array: {}", e),
        retryable: false,
    })?;

    let mut seen = HashSet::new();
    Ok(terms
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .take(max_terms)
        .collect())
}

/// Parse `{answer, confidence}`; confidence must lie in [0, 1]
fn parse_extraction(raw: &str) -> Result<Extraction> {
    let extraction: Extraction = serde_json::from_str(raw).map_err(|e| AppError::Extraction {
        message: format!("malformed analysis output: {}", e),
        retryable: false,
    })?;

    if let Some(confidence) = extraction.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(AppError::Extraction {
                message: format!("confidence {} outside [0, 1]", confidence),
                retryable: false,
            });
        }
    }

    Ok(extraction)
}

/// Deterministic offline backend
///
/// Echoes the query as the only search term and answers with the first
/// sentence of the page content at a fixed confidence.
pub struct MockBackend {
    confidence: f64,
}

impl MockBackend {
    pub fn new(confidence: f64) -> Self {
        Self { confidence }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate_json(&self, prompt: &str, schema: &Value) -> Result<String> {
        if prompts::is_array_schema(schema) {
            let query = prompts::labelled_line(prompt, prompts::QUERY_LABEL).unwrap_or_default();
            return Ok(serde_json::to_string(&[query])?);
        }

        let content = prompts::labelled_line(prompt, prompts::CONTENT_LABEL).unwrap_or_default();
        let answer = content
            .split_inclusive(['.', '!', '?'])
            .next()
            .unwrap_or_default()
            .trim();

        Ok(serde_json::json!({ "answer": answer, "confidence": self.confidence }).to_string())
    }

    fn provider(&self) -> &'static str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-generation"
    }
}

/// Create a generation backend based on configuration
pub fn create_backend(config: &GenerationConfig) -> Result<Arc<dyn GenerationBackend>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiBackend::new(config)?)),
        "openai" => Ok(Arc::new(OpenAiBackend::new(config)?)),
        "mock" => {
            tracing::warn!("Using mock generation backend");
            Ok(Arc::new(MockBackend::default()))
        }
        other => Err(AppError::configuration(format!(
            "unknown generation provider '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Backend returning a fixed reply, regardless of prompt
    struct CannedBackend(Result<String>);

    #[async_trait]
    impl GenerationBackend for CannedBackend {
        async fn generate_json(&self, _prompt: &str, _schema: &Value) -> Result<String> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(AppError::Generation { message: e.to_string(), retryable: false }),
            }
        }

        fn provider(&self) -> &'static str {
            "canned"
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    fn client(reply: &str, max_terms: usize) -> LlmClient {
        LlmClient::new(Arc::new(CannedBackend(Ok(reply.to_string()))), max_terms, 1_000)
    }

    #[tokio::test]
    async fn test_terms_are_trimmed_deduplicated_and_capped() {
        let client = client(r#"[" paris ", "", "Paris", "france capital", "louvre"]"#, 2);
        let terms = client.generate_terms("capital of France").await.unwrap();
        assert_eq!(terms, vec!["paris", "france capital"]);
    }

    #[tokio::test]
    async fn test_empty_term_list_is_not_an_error() {
        let terms = client("[]", 3).generate_terms("q").await.unwrap();
        assert!(terms.is_empty());
    }

    #[tokio::test]
    async fn test_non_array_terms_are_a_generation_error() {
        let err = client(r#"{"terms": 1}"#, 3).generate_terms("q").await.unwrap_err();
        assert!(matches!(err, AppError::Generation { .. }));
    }

    #[tokio::test]
    async fn test_analyze_parses_answer_and_confidence() {
        let extraction = client(r#"{"answer": "Paris", "confidence": 0.8}"#, 1)
            .analyze("Paris is the capital of France.", "capital of France?")
            .await
            .unwrap();
        assert_eq!(extraction, Extraction::new("Paris", 0.8));
    }

    #[tokio::test]
    async fn test_analyze_rejects_malformed_output() {
        let err = client("not json", 1).analyze("text", "q").await.unwrap_err();
        assert!(matches!(err, AppError::Extraction { .. }));

        let err = client(r#"{"answer": "x", "confidence": 1.5}"#, 1)
            .analyze("text", "q")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Extraction { .. }));
    }

    #[tokio::test]
    async fn test_analyze_maps_backend_failure_to_extraction_error() {
        let client = LlmClient::new(
            Arc::new(CannedBackend(Err(AppError::Internal { message: "down".into() }))),
            1,
            1_000,
        );
        let err = client.analyze("text", "q").await.unwrap_err();
        assert!(matches!(err, AppError::Extraction { .. }));
    }

    #[tokio::test]
    async fn test_analyze_allows_missing_fields() {
        let extraction = client(r#"{"answer": ""}"#, 1).analyze("text", "q").await.unwrap();
        assert_eq!(extraction.confidence, None);
    }

    #[tokio::test]
    async fn test_mock_backend_round_trip() {
        let client = LlmClient::new(Arc::new(MockBackend::new(0.7)), 1, 1_000);

        let terms = client.generate_terms("tallest mountain").await.unwrap();
        assert_eq!(terms, vec!["tallest mountain"]);

        let extraction = client
            .analyze("Everest is the tallest. It is in Nepal.", "tallest mountain")
            .await
            .unwrap();
        assert_eq!(extraction, Extraction::new("Everest is the tallest.", 0.7));
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let config = GenerationConfig { provider: "palm".into(), ..GenerationConfig::default() };
        assert!(create_backend(&config).is_err());
    }
}
