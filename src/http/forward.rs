//! Upstream forwarding and response relay.
//!
//! # Responsibilities
//! - Send the validated request to its target with a bounded wait
//! - Relay status and (filtered) headers
//! - Rewrite HTML/CSS bodies, stream everything else untouched
//!
//! # Request States
//! ```text
//! Received → Validated → UpstreamFetching → Rewriting → Completed
//!                                         ↘ Streaming → Completed
//! (any failure) → Failed, still answered with a JSON error body
//! ```
//!
//! # Design Decisions
//! - Rewritable bodies are buffered whole; rewriting needs the full document
//! - Passthrough bodies are streamed chunk by chunk, bounded memory
//! - The first passthrough chunk is read before headers are sent, so an
//!   early body failure still becomes a 500 instead of a cut connection
//! - Dropping the response body (caller gone) drops the upstream stream

use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, Request},
    response::{IntoResponse, Response},
};
use futures_util::{stream, Stream, StreamExt, TryStreamExt};
use url::Url;

use crate::config::UpstreamConfig;
use crate::http::error::{error_chain, ProxyError};
use crate::http::request::{request_id, ProxyRequest};
use crate::observability::metrics;
use crate::resilience::timeouts::{with_deadline, Deadline};
use crate::rewrite::{css, html, ContentKind, UrlRewriter};
use crate::security::headers::relayable_response_headers;

/// Forwards proxied requests and relays (possibly rewritten) responses.
pub struct Forwarder {
    client: reqwest::Client,
    rewriter: UrlRewriter,
    timeout: Duration,
    max_body_size: usize,
}

impl Forwarder {
    /// Build a forwarder and its upstream client from configuration.
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.timeout_secs);

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects));
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }

        Ok(Self {
            client: builder.build()?,
            rewriter: UrlRewriter::new(config.proxy_path.clone()),
            timeout,
            max_body_size: config.max_body_size,
        })
    }

    pub fn rewriter(&self) -> &UrlRewriter {
        &self.rewriter
    }

    /// Handle one inbound request end to end. Always yields a response.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let request_id = request_id(request.headers());
        let method = request.method().clone();

        match self.forward(request).await {
            Ok((response, kind)) => {
                metrics::record_request(method.as_str(), response.status().as_u16(), kind.as_str(), start);
                response
            }
            Err(e) => {
                let status = e.status();
                if status.is_server_error() {
                    tracing::warn!(request_id = %request_id, method = %method, kind = e.kind(), error = %e, "Proxy request failed");
                } else {
                    tracing::debug!(request_id = %request_id, method = %method, kind = e.kind(), error = %e, "Proxy request rejected");
                }
                metrics::record_request(method.as_str(), status.as_u16(), "error", start);
                e.into_response()
            }
        }
    }

    async fn forward(&self, request: Request<Body>) -> Result<(Response, ContentKind), ProxyError> {
        let request_id = request_id(request.headers());
        let proxy_request = ProxyRequest::from_request(request, self.max_body_size).await?;

        tracing::debug!(
            request_id = %request_id,
            method = %proxy_request.method,
            target = %proxy_request.target,
            "Proxying request"
        );

        let upstream = self.fetch(&proxy_request).await?;
        let (response, kind) = self.relay(upstream).await?;

        tracing::debug!(
            request_id = %request_id,
            target = %proxy_request.target,
            status = response.status().as_u16(),
            branch = kind.as_str(),
            "Upstream response relayed"
        );
        Ok((response, kind))
    }

    /// Send the request upstream and wait (bounded) for the response head.
    pub async fn fetch(&self, request: &ProxyRequest) -> Result<reqwest::Response, ProxyError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.target.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        with_deadline(self.timeout, builder.send())
            .await
            .map_err(|e| self.upstream_error(e))
    }

    /// Turn an upstream response into the caller's response.
    async fn relay(&self, upstream: reqwest::Response) -> Result<(Response, ContentKind), ProxyError> {
        let status = upstream.status();
        let kind = ContentKind::from_content_type(
            upstream
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        let mut headers = relayable_response_headers(upstream.headers());

        let body = match kind {
            ContentKind::Passthrough => self.open_stream(upstream).await?,
            ContentKind::Html | ContentKind::Css => {
                // Redirects were followed; the final URL anchors relative references.
                let base = upstream.url().clone();
                let text = self.buffer_text(upstream).await?;
                let rewritten = self.rewrite(kind, &text, &base);
                if let Some(content_type) = kind.rewritten_content_type() {
                    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
                }
                Body::from(rewritten)
            }
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok((response, kind))
    }

    /// Run the format driver for `kind` over a buffered body.
    pub fn rewrite(&self, kind: ContentKind, text: &str, base: &Url) -> String {
        let rewritten = match kind {
            ContentKind::Html => html::transform(text, base, &self.rewriter),
            ContentKind::Css => css::transform(text, base, &self.rewriter),
            ContentKind::Passthrough => return text.to_string(),
        };
        metrics::record_rewrite(kind.as_str());
        rewritten
    }

    async fn buffer_text(&self, upstream: reqwest::Response) -> Result<String, ProxyError> {
        with_deadline(self.timeout, upstream.text())
            .await
            .map_err(|e| self.body_error(e))
    }

    /// Start relaying a passthrough body.
    async fn open_stream(&self, upstream: reqwest::Response) -> Result<Body, ProxyError> {
        let target = upstream.url().to_string();
        let mut chunks = Box::pin(upstream.bytes_stream());

        let first = with_deadline(self.timeout, chunks.try_next())
            .await
            .map_err(|e| self.body_error(e))?;

        let relayed = stream::iter(first.map(Ok)).chain(chunks);
        Ok(Body::from_stream(log_interruptions(relayed, target)))
    }

    fn upstream_error(&self, err: Deadline<reqwest::Error>) -> ProxyError {
        match err {
            Deadline::Elapsed(limit) => ProxyError::UpstreamTimeout(limit.as_secs()),
            Deadline::Failed(e) => ProxyError::from_upstream(&e, self.timeout.as_secs()),
        }
    }

    fn body_error(&self, err: Deadline<reqwest::Error>) -> ProxyError {
        match err {
            Deadline::Elapsed(limit) => ProxyError::UpstreamTimeout(limit.as_secs()),
            Deadline::Failed(e) if e.is_timeout() => ProxyError::UpstreamTimeout(self.timeout.as_secs()),
            Deadline::Failed(e) => ProxyError::StreamInterrupted(error_chain(&e)),
        }
    }
}

/// Headers are already flushed once this stream runs; an error ends the connection.
fn log_interruptions<S>(chunks: S, target: String) -> impl Stream<Item = Result<Bytes, reqwest::Error>>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
{
    chunks.inspect_err(move |e| {
        metrics::record_stream_error();
        let err = ProxyError::StreamInterrupted(error_chain(e));
        tracing::warn!(target = %target, error = %err, "Passthrough stream interrupted");
    })
}
