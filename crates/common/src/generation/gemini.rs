//! Google Gemini `generateContent` backend with JSON-constrained output

use super::GenerationBackend;
use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use crate::retry::with_retry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini client
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: Option<f32>,
    max_retries: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationParams<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationParams<'a> {
    response_mime_type: &'static str,
    response_schema: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiBackend {
    /// Create a new Gemini backend
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::configuration("Gemini API key required"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    async fn make_request(&self, prompt: &str, schema: &Value) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationParams {
                response_mime_type: "application/json",
                response_schema: schema,
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Generation {
                message: format!("Gemini request failed: {}", e),
                retryable: e.is_timeout() || e.is_connect(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation {
                message: format!("Gemini API error {}: {}", status, body),
                retryable: AppError::is_retryable_status(status),
            });
        }

        let result: GenerateResponse = response.json().await.map_err(|e| AppError::Generation {
            message: format!("Failed to parse Gemini response: {}", e),
            retryable: false,
        })?;

        if let Some(reason) = result.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(AppError::Generation {
                message: format!("Gemini blocked the prompt: {}", reason),
                retryable: false,
            });
        }

        let candidate = result.candidates.into_iter().next().ok_or_else(|| AppError::Generation {
            message: "Empty response from Gemini".to_string(),
            retryable: false,
        })?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AppError::Generation {
                message: format!(
                    "Gemini returned no text (finish reason: {})",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                ),
                retryable: false,
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate_json(&self, prompt: &str, schema: &Value) -> Result<String> {
        with_retry("gemini.generate", self.max_retries, || self.make_request(prompt, schema)).await
    }

    fn provider(&self) -> &'static str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> GeminiBackend {
        let config = GenerationConfig {
            api_key: Some("test-key".into()),
            api_base: Some(server.uri()),
            max_retries: 1,
            ..GenerationConfig::default()
        };
        GeminiBackend::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_generate_json_sends_schema_and_reads_parts() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "[\"capital " }, { "text": "of France\"]" }] },
                    "finishReason": "STOP"
                }]
            })))
            .mount(&server)
            .await;

        let text = backend(&server)
            .generate_json("prompt", &serde_json::json!({ "type": "ARRAY" }))
            .await
            .unwrap();
        assert_eq!(text, "[\"capital of France\"]");
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let err = backend(&server)
            .generate_json("prompt", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Generation { retryable: false, .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let err = backend(&server)
            .generate_json("prompt", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [],
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let err = backend(&server)
            .generate_json("prompt", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let err = GeminiBackend::new(&GenerationConfig::default()).err().unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));
    }
}
