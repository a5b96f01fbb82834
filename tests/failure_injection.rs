//! Failure injection tests: every failure still yields a well-formed response.

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, StatusCode},
    routing::get,
    Router,
};
use futures_util::{stream, StreamExt};
use serde_json::Value;
use tokio::sync::oneshot;

mod common;

async fn error_message(res: reqwest::Response) -> String {
    let value: Value = res.json().await.expect("JSON error body");
    let object = value.as_object().expect("error body is an object");
    assert_eq!(object.len(), 1, "error body has a single field: {value}");
    object["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_missing_parameter() {
    let (proxy_addr, shutdown) = common::start_proxy(|_| {}).await;

    let res = common::client()
        .get(format!("http://{proxy_addr}/proxy"))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(res).await.contains("url"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_invalid_url() {
    let (proxy_addr, shutdown) = common::start_proxy(|_| {}).await;

    let res = common::client()
        .get(format!("http://{proxy_addr}/proxy?url=not-a-url"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(res).await.starts_with("Invalid URL"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_forbidden_scheme() {
    let (proxy_addr, shutdown) = common::start_proxy(|_| {}).await;

    let res = common::client()
        .get(format!("http://{proxy_addr}/proxy?url=ftp://x.test/f"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(error_message(res).await.contains("ftp"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_connection_refused_is_bad_gateway() {
    let dead = common::closed_port().await;
    let (proxy_addr, shutdown) = common::start_proxy(|_| {}).await;

    let res = common::client()
        .get(common::via_proxy(proxy_addr, &format!("http://{dead}/")))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert!(error_message(res).await.starts_with("Upstream request failed"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_slow_upstream_is_gateway_timeout() {
    let site = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "too late"
        }),
    );
    let site_addr = common::start_upstream(site).await;
    let (proxy_addr, shutdown) = common::start_proxy(|config| {
        config.upstream.timeout_secs = 1;
        config.timeouts.request_secs = 10;
    })
    .await;

    let res = common::client()
        .get(common::via_proxy(proxy_addr, &format!("http://{site_addr}/slow")))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(error_message(res).await.contains("timed out"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_body_over_limit_rejected() {
    let (proxy_addr, shutdown) = common::start_proxy(|config| {
        config.upstream.max_body_size = 16;
    })
    .await;

    let res = common::client()
        .post(common::via_proxy(proxy_addr, "http://127.0.0.1:9/"))
        .body(vec![0u8; 64])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

    shutdown.trigger();
}

#[tokio::test]
async fn test_broken_first_chunk_is_server_error() {
    let site = Router::new().route(
        "/broken",
        get(|| async {
            // Pending first lets the headers flush before the body fails.
            let chunks = stream::once(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Err::<Vec<u8>, std::io::Error>(std::io::Error::other("disk on fire"))
            });
            ([(header::CONTENT_TYPE, "application/octet-stream")], Body::from_stream(chunks))
        }),
    );
    let site_addr = common::start_upstream(site).await;
    let (proxy_addr, shutdown) = common::start_proxy(|_| {}).await;

    let res = common::client()
        .get(common::via_proxy(proxy_addr, &format!("http://{site_addr}/broken")))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(error_message(res).await.starts_with("Upstream stream interrupted"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_failure_after_first_chunk_cuts_connection() {
    let site = Router::new().route(
        "/flaky",
        get(|| async {
            let first = stream::iter(vec![Ok::<Vec<u8>, std::io::Error>(vec![1u8; 1024])]);
            let failure = stream::once(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Err(std::io::Error::other("disk on fire"))
            });
            ([(header::CONTENT_TYPE, "application/octet-stream")], Body::from_stream(first.chain(failure)))
        }),
    );
    let site_addr = common::start_upstream(site).await;
    let (proxy_addr, shutdown) = common::start_proxy(|_| {}).await;

    let res = common::client()
        .get(common::via_proxy(proxy_addr, &format!("http://{site_addr}/flaky")))
        .send()
        .await
        .unwrap();

    // Headers were already relayed with the first chunk.
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.bytes().await.is_err());

    shutdown.trigger();
}

/// Fires when the upstream body stream is dropped.
struct DropSignal(Option<oneshot::Sender<()>>);

impl Drop for DropSignal {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

#[tokio::test]
async fn test_caller_disconnect_releases_upstream() {
    let (dropped_tx, dropped_rx) = oneshot::channel();
    let signal = std::sync::Mutex::new(Some(DropSignal(Some(dropped_tx))));
    let signal = std::sync::Arc::new(signal);

    let site = Router::new().route(
        "/endless",
        get(move || {
            let guard = signal.lock().unwrap().take();
            async move {
                let chunks = stream::unfold(guard, |guard| async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Some((Ok::<Vec<u8>, std::io::Error>(vec![0u8; 16 * 1024]), guard))
                });
                ([(header::CONTENT_TYPE, "video/mp4")], Body::from_stream(chunks))
            }
        }),
    );
    let site_addr = common::start_upstream(site).await;
    let (proxy_addr, shutdown) = common::start_proxy(|_| {}).await;

    let mut res = common::client()
        .get(common::via_proxy(proxy_addr, &format!("http://{site_addr}/endless")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.chunk().await.unwrap().is_some());
    drop(res);

    let released = tokio::time::timeout(Duration::from_secs(10), dropped_rx).await;
    assert!(released.is_ok(), "upstream stream still alive after caller left");

    shutdown.trigger();
}
