//! Request body limits.
//!
//! # Responsibilities
//! - Enforce maximum inbound body size before anything is sent upstream
//!
//! # Design Decisions
//! - Bodies over the limit are rejected with 413, never truncated
//! - Only methods that carry a body are read at all

use axum::body::{Body, Bytes};
use axum::http::Method;
use http_body_util::LengthLimitError;

use crate::http::error::{error_chain, ProxyError};

/// Methods whose inbound body is forwarded upstream.
pub fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Read the whole inbound body, bounded by `max_bytes`.
pub async fn read_body(body: Body, max_bytes: usize) -> Result<Bytes, ProxyError> {
    axum::body::to_bytes(body, max_bytes).await.map_err(|e| {
        if is_length_limit(&e) {
            ProxyError::BodyTooLarge(max_bytes)
        } else {
            ProxyError::InvalidBody(error_chain(&e))
        }
    })
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(cause) = source {
        if cause.is::<LengthLimitError>() {
            return true;
        }
        source = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carries_body() {
        assert!(carries_body(&Method::POST));
        assert!(carries_body(&Method::PUT));
        assert!(carries_body(&Method::PATCH));
        assert!(!carries_body(&Method::GET));
        assert!(!carries_body(&Method::HEAD));
        assert!(!carries_body(&Method::DELETE));
    }

    #[tokio::test]
    async fn test_read_within_limit() {
        let bytes = read_body(Body::from("hello"), 16).await.unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn test_stream_error_is_not_a_limit() {
        let chunks = futures_util::stream::iter(vec![Err::<Bytes, std::io::Error>(std::io::Error::other(
            "length limit exceeded",
        ))]);
        let err = read_body(Body::from_stream(chunks), 1024).await.unwrap_err();
        assert!(matches!(err, ProxyError::InvalidBody(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_read_over_limit() {
        let err = read_body(Body::from("0123456789"), 4).await.unwrap_err();
        assert!(matches!(err, ProxyError::BodyTooLarge(4)));
    }
}
