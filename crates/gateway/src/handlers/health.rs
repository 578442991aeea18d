//! Health check handlers

use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub configuration: CheckResult,
    pub generation: CheckResult,
    pub search: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn up(provider: impl Into<String>) -> Self {
        Self {
            status: "up".to_string(),
            provider: Some(provider.into()),
            error: None,
        }
    }
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: answerforge_common::VERSION.to_string(),
    })
}

/// Readiness probe - checks the pipeline is fully configured
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let configuration = match state.config.validate() {
        Ok(()) => CheckResult {
            status: "up".to_string(),
            provider: None,
            error: None,
        },
        Err(e) => CheckResult {
            status: "down".to_string(),
            provider: None,
            error: Some(e.to_string()),
        },
    };

    let all_healthy = configuration.status == "up";
    let status = if all_healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status,
        Json(ReadyResponse {
            status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
            checks: HealthChecks {
                configuration,
                generation: CheckResult::up(state.config.generation.provider.clone()),
                search: CheckResult::up(state.orchestrator.search_provider()),
            },
        }),
    )
}

/// Prometheus scrape endpoint
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    async fn get(uri: &str) -> (StatusCode, Vec<u8>) {
        let response = test_support::app()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get("/health").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["version"], answerforge_common::VERSION);
    }

    #[tokio::test]
    async fn test_ready_reports_providers() {
        let (status, body) = get("/ready").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["checks"]["generation"]["provider"], "mock");
        assert_eq!(json["checks"]["search"]["provider"], "static");
    }

    #[tokio::test]
    async fn test_metrics_disabled_is_not_found() {
        let (status, _) = get("/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
