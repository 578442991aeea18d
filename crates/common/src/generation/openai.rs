//! OpenAI-compatible chat completions backend

use super::prompts::is_array_schema;
use super::GenerationBackend;
use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use crate::retry::with_retry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// JSON mode only yields objects, so array schemas are wrapped under this key
const ARRAY_WRAPPER_KEY: &str = "items";

/// OpenAI chat completions client
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    temperature: Option<f32>,
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAiBackend {
    /// Create a new OpenAI backend
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::configuration("OpenAI API key required"))?;

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
            endpoint: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_ENDPOINT.to_string()),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    fn system_prompt(schema: &Value) -> String {
        if is_array_schema(schema) {
            format!(
                "Reply with JSON only: an object whose \"{ARRAY_WRAPPER_KEY}\" field is an array \
                 matching this JSON schema: {schema}"
            )
        } else {
            format!("Reply with JSON only, matching this JSON schema: {schema}")
        }
    }

    async fn make_request(&self, prompt: &str, schema: &Value) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: Self::system_prompt(schema),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Generation {
                message: format!("LLM API request failed: {}", e),
                retryable: e.is_timeout() || e.is_connect(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation {
                message: format!("LLM API error {}: {}", status, body),
                retryable: AppError::is_retryable_status(status),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| AppError::Generation {
            message: format!("Failed to parse LLM response: {}", e),
            retryable: false,
        })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::Generation {
                message: "Empty response from LLM".to_string(),
                retryable: false,
            })?;

        if is_array_schema(schema) {
            unwrap_array(&content)
        } else {
            Ok(content)
        }
    }
}

/// Pull the wrapped array back out of a JSON-mode object reply
fn unwrap_array(content: &str) -> Result<String> {
    let mut value: Value = serde_json::from_str(content).map_err(|e| AppError::Generation {
        message: format!("LLM returned invalid JSON: {}", e),
        retryable: false,
    })?;

    if value.is_array() {
        return Ok(content.to_string());
    }

    match value.get_mut(ARRAY_WRAPPER_KEY).map(Value::take) {
        Some(items @ Value::Array(_)) => Ok(items.to_string()),
        _ => Err(AppError::Generation {
            message: format!("LLM reply has no \"{ARRAY_WRAPPER_KEY}\" array"),
            retryable: false,
        }),
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    async fn generate_json(&self, prompt: &str, schema: &Value) -> Result<String> {
        with_retry("openai.generate", self.max_retries, || self.make_request(prompt, schema)).await
    }

    fn provider(&self) -> &'static str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
