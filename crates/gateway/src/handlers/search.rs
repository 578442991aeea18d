//! Search handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::CONTENT_LENGTH, HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::AppState;
use answerforge_common::{
    errors::{AppError, Result},
    model::RankedResultSet,
};

/// Search request
#[derive(Debug, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 2000))]
    pub query: String,
}

/// Answer a natural-language query
///
/// Responds with candidates ranked by confidence, or 500 when the pipeline
/// produced none.
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<RankedResultSet>> {
    let Json(request) = payload
        .map_err(|rejection| reject(rejection, &headers, state.config.server.max_body_bytes))?;

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("query".to_string()),
    })?;

    let (result, report) = state.orchestrator.run_with_report(&request.query).await;
    let results = result?;

    tracing::info!(
        query = %request.query,
        results = results.len(),
        latency_ms = report.elapsed_ms,
        "Search completed"
    );

    Ok(Json(results))
}

fn reject(rejection: JsonRejection, headers: &HeaderMap, limit: usize) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let size = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        return AppError::PayloadTooLarge { size, limit };
    }

    AppError::Validation {
        message: rejection.body_text(),
        field: None,
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{self, PARIS_URL};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn post(uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
        let response = test_support::app()
            .oneshot(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(body.into())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_search_returns_ranked_candidates() {
        let (status, body) = post("/search", json!({ "query": "capital of France" }).to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([{
                "answer": "Paris is the capital of France.",
                "confidence": 0.8,
                "source_url": PARIS_URL,
            }])
        );
    }

    #[tokio::test]
    async fn test_trailing_slash_route() {
        let (status, body) = post("/search/", json!({ "query": "capital of France" }).to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_no_candidates_is_500() {
        // No registered hits and no fallback template: zero candidates
        let (status, body) = post("/search", json!({ "query": "unknown topic" }).to_string()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "NO_RESULTS");
        assert_eq!(body["error"]["message"], "Unable to search or analyse results");
    }

    #[tokio::test]
    async fn test_empty_query_is_400() {
        let (status, body) = post("/search", json!({ "query": "" }).to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = post("/search", json!({ "query": "   " }).to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let (status, body) = post("/search", "{\"q\": 1}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let query = "a".repeat(64 * 1024);
        let (status, body) = post("/search", json!({ "query": query }).to_string()).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
    }
}
