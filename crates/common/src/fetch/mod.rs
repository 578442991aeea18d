//! Page fetching: URL -> sanitized plain text
//!
//! Any transport failure, non-2xx status, non-text body or page without
//! visible text is reported as [`AppError::Fetch`]; error text is never
//! passed on as page content.

mod sanitize;

pub use sanitize::{collapse_whitespace, sanitize_html, truncate_chars};

use crate::config::FetchConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use url::Url;

/// Turns a URL into plain text
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String>;
}

/// reqwest-backed fetcher
pub struct HttpContentFetcher {
    client: reqwest::Client,
    max_content_chars: usize,
    max_body_bytes: usize,
}

impl HttpContentFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            max_content_chars: config.max_content_chars,
            max_body_bytes: config.max_body_bytes,
        })
    }

    fn error(url: &Url, message: impl Into<String>) -> AppError {
        AppError::Fetch {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

/// Read at most `limit` body bytes, leaving the rest of the stream unread
async fn read_capped(mut response: reqwest::Response, limit: usize) -> reqwest::Result<Vec<u8>> {
    let mut body = Vec::new();

    while let Some(chunk) = response.chunk().await? {
        let room = limit - body.len();
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            break;
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

#[derive(Debug, PartialEq)]
enum BodyKind {
    Html,
    PlainText,
}

/// Classify a Content-Type header; `None` for bodies with no readable text
fn body_kind(content_type: Option<&str>) -> Option<BodyKind> {
    let Some(content_type) = content_type else {
        return Some(BodyKind::Html);
    };

    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "text/html" | "application/xhtml+xml" | "" => Some(BodyKind::Html),
        "text/plain" => Some(BodyKind::PlainText),
        m if m.starts_with("text/") => Some(BodyKind::PlainText),
        _ => None,
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    #[tracing::instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Self::error(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::error(url, format!("HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let kind = body_kind(content_type.as_deref()).ok_or_else(|| {
            Self::error(
                url,
                format!("unsupported content type {}", content_type.as_deref().unwrap_or_default()),
            )
        })?;

        let bytes = read_capped(response, self.max_body_bytes)
            .await
            .map_err(|e| Self::error(url, format!("failed to read body: {}", e)))?;
        let body = String::from_utf8_lossy(&bytes);

        let text = match kind {
            BodyKind::Html => sanitize_html(&body),
            BodyKind::PlainText => collapse_whitespace(&body),
        };

        if text.is_empty() {
            return Err(Self::error(url, "page has no text content"));
        }

        let text = truncate_chars(&text, self.max_content_chars).to_string();
        tracing::debug!(chars = text.len(), "Fetched page");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(max_content_chars: usize) -> HttpContentFetcher {
        let config = FetchConfig {
            max_content_chars,
            ..FetchConfig::default()
        };
        HttpContentFetcher::new(&config).unwrap()
    }

    fn byte_capped_fetcher(max_body_bytes: usize) -> HttpContentFetcher {
        let config = FetchConfig {
            max_body_bytes,
            ..FetchConfig::default()
        };
        HttpContentFetcher::new(&config).unwrap()
    }

    fn page_url(server: &MockServer, page: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), page)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_sanitizes_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paris"))
            .and(header("user-agent", "Mozilla/5.0 (compatible; WebCrawler/1.0)"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    "<html><body><script>x()</script><p>Paris\nis nice</p></body></html>",
                    "text/html; charset=utf-8",
                ),
            )
            .mount(&server)
            .await;

        let text = fetcher(1_000).fetch(&page_url(&server, "/paris")).await.unwrap();
        assert_eq!(text, "Paris is nice");
    }

    #[tokio::test]
    async fn test_http_error_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = page_url(&server, "/missing");
        let err = fetcher(1_000).fetch(&url).await.unwrap_err();
        match err {
            AppError::Fetch { url: failed, message } => {
                assert_eq!(failed, url.to_string());
                assert!(message.contains("404"));
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_page_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body><script>only()</script></body></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let err = fetcher(1_000).fetch(&page_url(&server, "/")).await.unwrap_err();
        assert!(matches!(err, AppError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_binary_body_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(vec![0x25u8, 0x50, 0x44, 0x46], "application/pdf"),
            )
            .mount(&server)
            .await;

        let err = fetcher(1_000).fetch(&page_url(&server, "/doc.pdf")).await.unwrap_err();
        assert!(err.to_string().contains("application/pdf"));
    }

    #[tokio::test]
    async fn test_text_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("abcdefghij", "text/plain"),
            )
            .mount(&server)
            .await;

        let text = fetcher(4).fetch(&page_url(&server, "/")).await.unwrap();
        assert_eq!(text, "abcd");
    }

    #[tokio::test]
    async fn test_body_read_stops_at_byte_budget() {
        let server = MockServer::start().await;
        let body = "abcdefgh".repeat(16 * 1024);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/plain"))
            .mount(&server)
            .await;

        let text = byte_capped_fetcher(8).fetch(&page_url(&server, "/")).await.unwrap();
        assert_eq!(text, "abcdefgh");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_fetch_error() {
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        let err = fetcher(1_000).fetch(&url).await.unwrap_err();
        assert!(matches!(err, AppError::Fetch { .. }));
    }

    #[test]
    fn test_body_kind() {
        assert_eq!(body_kind(None), Some(BodyKind::Html));
        assert_eq!(body_kind(Some("text/html; charset=utf-8")), Some(BodyKind::Html));
        assert_eq!(body_kind(Some("TEXT/PLAIN")), Some(BodyKind::PlainText));
        assert_eq!(body_kind(Some("image/png")), None);
    }
}
