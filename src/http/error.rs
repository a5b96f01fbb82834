//! Proxy error taxonomy and its HTTP rendering.
//!
//! Validation errors are raised before any upstream call and map to 4xx.
//! Upstream errors are gateway-class and carry the original failure text.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors that end a proxied request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No `url` query parameter (or an empty one).
    #[error("Missing required 'url' query parameter")]
    MissingParameter,

    /// `url` is not an absolute URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// `url` uses a scheme other than http/https.
    #[error("Forbidden URL scheme '{0}': only http and https are allowed")]
    ForbiddenScheme(String),

    /// Inbound body exceeds the configured limit.
    #[error("Request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    /// Inbound body could not be read.
    #[error("Failed to read request body: {0}")]
    InvalidBody(String),

    /// DNS, connect, TLS or protocol failure talking to the target.
    #[error("Upstream request failed: {0}")]
    UpstreamUnavailable(String),

    /// Target did not answer within the deadline.
    #[error("Upstream request timed out after {0} seconds")]
    UpstreamTimeout(u64),

    /// Upstream body failed while being read.
    #[error("Upstream stream interrupted: {0}")]
    StreamInterrupted(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingParameter | ProxyError::InvalidUrl(_) | ProxyError::InvalidBody(_) => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::ForbiddenScheme(_) => StatusCode::FORBIDDEN,
            ProxyError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::StreamInterrupted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::MissingParameter => "missing_parameter",
            ProxyError::InvalidUrl(_) => "invalid_url",
            ProxyError::ForbiddenScheme(_) => "forbidden_scheme",
            ProxyError::BodyTooLarge(_) => "body_too_large",
            ProxyError::InvalidBody(_) => "invalid_body",
            ProxyError::UpstreamUnavailable(_) => "upstream_unavailable",
            ProxyError::UpstreamTimeout(_) => "upstream_timeout",
            ProxyError::StreamInterrupted(_) => "stream_interrupted",
        }
    }

    /// Build an upstream error from a client failure, keeping the source chain.
    pub fn from_upstream(err: &reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            ProxyError::UpstreamTimeout(timeout_secs)
        } else {
            ProxyError::UpstreamUnavailable(error_chain(err))
        }
    }
}

/// JSON error body: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Render an error and its sources as `outer: inner: root`.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProxyError::MissingParameter.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ProxyError::InvalidUrl("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ProxyError::ForbiddenScheme("ftp".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ProxyError::BodyTooLarge(1).status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            ProxyError::UpstreamUnavailable("refused".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(ProxyError::UpstreamTimeout(15).status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            ProxyError::StreamInterrupted("reset".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_json_body() {
        let response = ProxyError::ForbiddenScheme("ftp".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert!(object["error"].as_str().unwrap().contains("ftp"));
    }

    #[test]
    fn test_error_chain() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let outer = ProxyError::StreamInterrupted("body".into());
        assert_eq!(error_chain(&inner), "connection refused");
        assert_eq!(error_chain(&outer), "Upstream stream interrupted: body");
    }
}
