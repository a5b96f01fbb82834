//! Header filtering between caller, proxy and upstream.
//!
//! # Responsibilities
//! - Strip hop-by-hop and framing headers in both directions
//! - Never leak the proxy's own origin upstream (host, referer)
//! - Keep `Range` so partial content works end-to-end
//!
//! # Design Decisions
//! - Deny lists, not allow lists: unknown headers pass through
//! - Framing headers are recomputed by the server, never copied

use axum::http::HeaderMap;

/// Request headers never forwarded to the target.
const STRIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "referer",
    "keep-alive",
    "proxy-connection",
    "proxy-authorization",
    "te",
    "trailer",
    "upgrade",
    // The upstream client negotiates and decodes compression itself.
    "accept-encoding",
    // Replaced by the configured identification.
    "user-agent",
];

/// Response headers never relayed to the caller.
const STRIPPED_RESPONSE_HEADERS: &[&str] = &[
    "connection",
    "content-encoding",
    "transfer-encoding",
    "content-length",
    "keep-alive",
    "proxy-connection",
    "trailer",
    "upgrade",
];

fn filtered(source: &HeaderMap, stripped: &[&str]) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        if stripped.contains(&name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Headers to send upstream, derived from the caller's request.
pub fn forwardable_request_headers(inbound: &HeaderMap) -> HeaderMap {
    filtered(inbound, STRIPPED_REQUEST_HEADERS)
}

/// Headers to relay to the caller, derived from the upstream response.
pub fn relayable_response_headers(upstream: &HeaderMap) -> HeaderMap {
    filtered(upstream, STRIPPED_RESPONSE_HEADERS)
}
