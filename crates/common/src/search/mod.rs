//! Web search collaborators: search term -> ordered hits

mod google;

pub use google::GoogleCustomSearch;

use crate::config::SearchConfig;
use crate::errors::{AppError, Result};
use crate::model::{parse_absolute_url, Hit};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps a search term to hits, best first
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, term: &str) -> Result<Vec<Hit>>;

    fn provider(&self) -> &'static str;
}

/// Placeholder substituted with the URL-encoded term
pub const TERM_PLACEHOLDER: &str = "{term}";

/// Keyless provider for local runs: one hit per term built from a URL template
pub const DEFAULT_MOCK_TEMPLATE: &str = "https://en.wikipedia.org/w/index.php?search={term}";

/// Canned search results
///
/// Terms registered with [`StaticSearchProvider::with_hits`] return their hits;
/// other terms get a single hit built from the fallback template, or nothing.
#[derive(Default)]
pub struct StaticSearchProvider {
    hits: HashMap<String, Vec<Hit>>,
    fallback_template: Option<String>,
}

impl StaticSearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hits(mut self, term: impl Into<String>, hits: Vec<Hit>) -> Self {
        self.hits.insert(term.into(), hits);
        self
    }

    pub fn with_fallback_template(mut self, template: impl Into<String>) -> Self {
        self.fallback_template = Some(template.into());
        self
    }

    fn fallback_hit(&self, term: &str) -> Result<Option<Hit>> {
        let Some(template) = &self.fallback_template else {
            return Ok(None);
        };

        let encoded: String = url::form_urlencoded::byte_serialize(term.as_bytes()).collect();
        let url = parse_absolute_url(&template.replace(TERM_PLACEHOLDER, &encoded))
            .map_err(|e| AppError::Search { message: e.to_string(), retryable: false })?;

        Ok(Some(Hit {
            url,
            title: term.to_string(),
            snippet: String::new(),
            display_url: None,
        }))
    }
}

#[async_trait]
impl SearchProvider for StaticSearchProvider {
    async fn search(&self, term: &str) -> Result<Vec<Hit>> {
        if let Some(hits) = self.hits.get(term) {
            return Ok(hits.clone());
        }
        Ok(self.fallback_hit(term)?.into_iter().collect())
    }

    fn provider(&self) -> &'static str {
        "static"
    }
}

/// Create a search provider based on configuration
pub fn create_search_provider(config: &SearchConfig) -> Result<Arc<dyn SearchProvider>> {
    match config.provider.as_str() {
        "google" => Ok(Arc::new(GoogleCustomSearch::new(config)?)),
        "mock" => {
            tracing::warn!("Using static search provider");
            Ok(Arc::new(
                StaticSearchProvider::new().with_fallback_template(DEFAULT_MOCK_TEMPLATE),
            ))
        }
        other => Err(AppError::configuration(format!(
            "unknown search provider '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_returns_registered_hits() {
        let hit = Hit::new("https://example.com/a", "A", "").unwrap();
        let provider = StaticSearchProvider::new().with_hits("a", vec![hit.clone()]);

        assert_eq!(provider.search("a").await.unwrap(), vec![hit]);
        assert!(provider.search("b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_template_encodes_term() {
        let provider = StaticSearchProvider::new().with_fallback_template(DEFAULT_MOCK_TEMPLATE);
        let hits = provider.search("capital of france").await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(
            hits[0].url.as_str(),
            "https://en.wikipedia.org/w/index.php?search=capital+of+france"
        );
    }

    #[test]
    fn test_google_provider_requires_credentials() {
        assert!(create_search_provider(&SearchConfig::default()).is_err());

        let config = SearchConfig { provider: "mock".into(), ..SearchConfig::default() };
        assert_eq!(create_search_provider(&config).unwrap().provider(), "static");
    }
}
