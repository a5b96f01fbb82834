//! Inbound request validation and preparation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4)
//! - Extract and validate the `url` target before any network activity
//! - Filter inbound headers and read the body for methods that carry one
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Validation failures never touch the body or the network
//! - A `ProxyRequest` is immutable once built

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderValue, Method, Request},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use url::Url;
use uuid::Uuid;

use crate::http::error::ProxyError;
use crate::security::headers::forwardable_request_headers;
use crate::security::limits::{carries_body, read_body};

/// Header carrying the request ID in both directions.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates UUID v4 request IDs for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Request ID of an inbound request, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// A validated request ready to be sent to its target.
#[derive(Debug)]
pub struct ProxyRequest {
    pub method: Method,
    pub target: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ProxyRequest {
    /// Validate and prepare an inbound request.
    pub async fn from_request(request: Request<Body>, max_body_size: usize) -> Result<Self, ProxyError> {
        let target = target_from_query(request.uri().query())?;

        let (parts, body) = request.into_parts();
        let body = if carries_body(&parts.method) {
            Some(read_body(body, max_body_size).await?)
        } else {
            None
        };

        Ok(Self {
            headers: forwardable_request_headers(&parts.headers),
            method: parts.method,
            target,
            body,
        })
    }
}

/// Extract the target from the `url` query parameter.
pub fn target_from_query(query: Option<&str>) -> Result<Url, ProxyError> {
    let raw = query
        .into_iter()
        .flat_map(|q| url::form_urlencoded::parse(q.as_bytes()))
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.trim().is_empty())
        .ok_or(ProxyError::MissingParameter)?;

    parse_target(&raw)
}

/// Parse an absolute http/https target URL.
pub fn parse_target(raw: &str) -> Result<Url, ProxyError> {
    let target = Url::parse(raw.trim()).map_err(|e| ProxyError::InvalidUrl(format!("{raw}: {e}")))?;

    match target.scheme() {
        "http" | "https" => Ok(target),
        other => Err(ProxyError::ForbiddenScheme(other.to_string())),
    }
}
