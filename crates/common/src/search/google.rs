//! Google Programmable Search (Custom Search JSON API)

use super::SearchProvider;
use crate::config::SearchConfig;
use crate::errors::{AppError, Result};
use crate::model::{parse_absolute_url, Hit};
use crate::retry::with_retry;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Custom Search JSON API client
pub struct GoogleCustomSearch {
    client: reqwest::Client,
    api_key: String,
    engine_id: String,
    base_url: String,
    max_retries: u32,
}

#[derive(Deserialize)]
struct SearchResponse {
    /// Absent when the query has no results
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    link: Option<String>,
    formatted_url: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl SearchItem {
    fn into_hit(self) -> Option<Hit> {
        let url = self
            .link
            .as_deref()
            .and_then(|link| parse_absolute_url(link).ok())
            .or_else(|| {
                self.formatted_url
                    .as_deref()
                    .and_then(|formatted| parse_absolute_url(formatted).ok())
            })?;

        Some(Hit {
            url,
            title: self.title,
            snippet: self.snippet,
            display_url: self.formatted_url,
        })
    }
}

impl GoogleCustomSearch {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::configuration("search.api_key is required"))?;
        let engine_id = config
            .engine_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::configuration("search.engine_id is required"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            engine_id,
            base_url: config.api_base.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn make_request(&self, term: &str) -> Result<Vec<Hit>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("key", self.api_key.as_str()), ("cx", self.engine_id.as_str()), ("q", term)])
            .send()
            .await
            .map_err(|e| AppError::Search {
                message: format!("Search request failed: {}", e),
                retryable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|env| env.error.message)
                .unwrap_or(body);
            return Err(AppError::Search {
                message: format!("Search API error {}: {}", status, detail),
                retryable: AppError::is_retryable_status(status),
            });
        }

        let result: SearchResponse = response.json().await.map_err(|e| AppError::Search {
            message: format!("Failed to parse search response: {}", e),
            retryable: false,
        })?;

        let total = result.items.len();
        let hits: Vec<Hit> = result.items.into_iter().filter_map(SearchItem::into_hit).collect();
        if hits.len() < total {
            tracing::debug!(
                skipped = total - hits.len(),
                "Dropped search items without an absolute URL"
            );
        }

        Ok(hits)
    }
}

#[async_trait]
impl SearchProvider for GoogleCustomSearch {
    #[tracing::instrument(skip(self))]
    async fn search(&self, term: &str) -> Result<Vec<Hit>> {
        if term.trim().is_empty() {
            return Err(AppError::Search {
                message: "search term is empty".to_string(),
                retryable: false,
            });
        }

        with_retry("google.search", self.max_retries, || self.make_request(term)).await
    }

    fn provider(&self) -> &'static str {
        "google"
    }
}
