//! Configuration management for AnswerForge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Flat legacy variables (GEMINI_API_KEY, SEARCH_API_KEY, SEARCH_ENGINE_ID)
//! - Default values

use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sequential stages a request waits on, each bounded by `call_timeout_secs`
pub const PIPELINE_STAGES: u64 = 4;

/// Upper bound for any `max_retries` setting
pub const MAX_RETRIES: u32 = 10;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Text-generation backend (term generation and answer extraction)
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Web search backend
    #[serde(default)]
    pub search: SearchConfig,

    /// Page fetching
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Orchestrator tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Maximum accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Directory served under /static (disabled when unset)
    pub static_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Provider: gemini, openai, mock
    #[serde(default = "default_generation_provider")]
    pub provider: String,

    /// API key for the generation service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_retries")]
    pub max_retries: u32,

    /// Upper bound on generated search terms per query
    #[serde(default = "default_max_search_terms")]
    pub max_search_terms: usize,

    /// Page text budget handed to the extractor, in characters
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    /// Sampling temperature
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Provider: google, mock
    #[serde(default = "default_search_provider")]
    pub provider: String,

    /// Google Custom Search API key
    pub api_key: Option<String>,

    /// Programmable search engine id (cx)
    pub engine_id: Option<String>,

    /// API base URL
    #[serde(default = "default_search_api_base")]
    pub api_base: String,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// User-Agent sent with page requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Sanitized text is cut to this many characters
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Redirects followed before giving up
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Raw body bytes read per page; the rest is never downloaded
    #[serde(default = "default_max_fetch_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Hits kept per search term (K)
    #[serde(default = "default_hits_per_term")]
    pub hits_per_term: usize,

    /// Cap on returned candidates (unset returns the full ranked set)
    pub max_results: Option<usize>,

    /// Bound on every individual collaborator call, in seconds
    ///
    /// Covers the call's retries too: attempts still pending when it elapses
    /// are abandoned and the call counts as timed out.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Cap on concurrently running tasks within one stage (unset: whole batch)
    pub max_in_flight: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Expose GET /metrics
    #[serde(default = "default_enabled")]
    pub metrics_enabled: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 200 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_concurrent() -> usize { 100 }
fn default_max_body_bytes() -> usize { 16 * 1024 }
fn default_generation_provider() -> String { "gemini".to_string() }
fn default_generation_model() -> String { "gemini-1.5-flash".to_string() }
fn default_generation_timeout() -> u64 { 30 }
fn default_retries() -> u32 { 2 }
fn default_max_search_terms() -> usize { 1 }
fn default_max_prompt_chars() -> usize { 30_000 }
fn default_search_provider() -> String { "google".to_string() }
fn default_search_api_base() -> String { "https://www.googleapis.com/customsearch/v1".to_string() }
fn default_search_timeout() -> u64 { 15 }
fn default_user_agent() -> String { "Mozilla/5.0 (compatible; WebCrawler/1.0)".to_string() }
fn default_fetch_timeout() -> u64 { 15 }
fn default_max_content_chars() -> usize { 100_000 }
fn default_max_redirects() -> usize { 5 }
fn default_max_fetch_bytes() -> usize { 2 * 1024 * 1024 }
fn default_hits_per_term() -> usize { 4 }
fn default_call_timeout() -> u64 { 45 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_enabled() -> bool { true }
fn default_service_name() -> String { "answerforge".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_concurrent_requests: default_max_concurrent(),
            max_body_bytes: default_max_body_bytes(),
            static_dir: None,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            api_key: None,
            api_base: None,
            model: default_generation_model(),
            timeout_secs: default_generation_timeout(),
            max_retries: default_retries(),
            max_search_terms: default_max_search_terms(),
            max_prompt_chars: default_max_prompt_chars(),
            temperature: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            api_key: None,
            engine_id: None,
            api_base: default_search_api_base(),
            timeout_secs: default_search_timeout(),
            max_retries: default_retries(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_fetch_timeout(),
            max_content_chars: default_max_content_chars(),
            max_redirects: default_max_redirects(),
            max_body_bytes: default_max_fetch_bytes(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            hits_per_term: default_hits_per_term(),
            max_results: None,
            call_timeout_secs: default_call_timeout(),
            max_in_flight: None,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_enabled: default_enabled(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            generation: GenerationConfig::default(),
            search: SearchConfig::default(),
            fetch: FetchConfig::default(),
            pipeline: PipelineConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        let mut config: AppConfig = config.try_deserialize()?;
        config.apply_legacy_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Fill unset secrets from the flat variable names used by older deployments
    pub fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fill = |slot: &mut Option<String>, name: &str| {
            if slot.as_deref().map_or(true, str::is_empty) {
                if let Some(value) = lookup(name).filter(|v| !v.is_empty()) {
                    *slot = Some(value);
                }
            }
        };

        fill(&mut self.generation.api_key, "GEMINI_API_KEY");
        fill(&mut self.search.api_key, "SEARCH_API_KEY");
        fill(&mut self.search.engine_id, "SEARCH_ENGINE_ID");
    }

    /// Reject configurations that cannot serve a single request
    pub fn validate(&self) -> Result<()> {
        if self.generation.provider != "mock" && is_blank(&self.generation.api_key) {
            return Err(AppError::configuration(format!(
                "generation.api_key is required for provider '{}'",
                self.generation.provider
            )));
        }

        if self.search.provider != "mock" {
            if is_blank(&self.search.api_key) {
                return Err(AppError::configuration("search.api_key is required"));
            }
            if is_blank(&self.search.engine_id) {
                return Err(AppError::configuration("search.engine_id is required"));
            }
        }

        if self.pipeline.hits_per_term == 0 {
            return Err(AppError::configuration("pipeline.hits_per_term must be at least 1"));
        }

        if self.pipeline.max_results == Some(0) {
            return Err(AppError::configuration("pipeline.max_results must be at least 1 when set"));
        }

        if self.pipeline.max_in_flight == Some(0) {
            return Err(AppError::configuration("pipeline.max_in_flight must be at least 1 when set"));
        }

        for (name, retries) in [
            ("generation.max_retries", self.generation.max_retries),
            ("search.max_retries", self.search.max_retries),
        ] {
            if retries > MAX_RETRIES {
                return Err(AppError::configuration(format!(
                    "{} must be at most {}",
                    name, MAX_RETRIES
                )));
            }
        }

        let pipeline_budget = PIPELINE_STAGES * self.pipeline.call_timeout_secs;
        if self.server.request_timeout_secs < pipeline_budget {
            return Err(AppError::configuration(format!(
                "server.request_timeout_secs ({}) must cover {} sequential stages of pipeline.call_timeout_secs ({}s)",
                self.server.request_timeout_secs, PIPELINE_STAGES, pipeline_budget
            )));
        }

        if self.generation.max_search_terms == 0 {
            return Err(AppError::configuration("generation.max_search_terms must be at least 1"));
        }

        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

}

impl PipelineConfig {
    /// Get the per-call collaborator bound as Duration
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}
