//! HTTP middleware

use answerforge_common::{
    errors::{AppError, ErrorResponse},
    metrics::RequestMetrics,
};
use axum::{
    body::{to_bytes, Body},
    extract::{MatchedPath, Request},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::Response,
    BoxError,
};

/// Error envelopes are small; anything larger passes through unstamped
const ERROR_BODY_LIMIT: usize = 64 * 1024;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request metrics middleware, labelled by matched route
pub async fn track_request(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());
    let metrics = RequestMetrics::start(request.method().as_str(), &endpoint);

    let response = next.run(request).await;

    metrics.finish(response.status().as_u16());
    response
}

/// Copy the request id into the `error.request_id` field of error envelopes
pub async fn attach_request_id(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let response = next.run(request).await;

    let status = response.status();
    let Some(request_id) = request_id else {
        return response;
    };
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, ERROR_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, status = status.as_u16(), "Dropped unreadable error body");
            parts.headers.remove(CONTENT_LENGTH);
            return Response::from_parts(parts, Body::empty());
        }
    };

    let stamped = serde_json::from_slice::<ErrorResponse>(&bytes)
        .ok()
        .and_then(|mut envelope| {
            envelope.error.request_id = Some(request_id);
            serde_json::to_vec(&envelope).ok()
        });

    match stamped {
        Some(body) => {
            parts.headers.remove(CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(body))
        }
        None => Response::from_parts(parts, Body::from(bytes)),
    }
}

/// Map a failure of the request timeout stack onto the error envelope
pub fn request_failed(err: BoxError, timeout_ms: u64) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::Timeout {
            operation: "request".into(),
            timeout_ms,
        }
    } else {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}
