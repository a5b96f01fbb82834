//! Rewriting HTTP forward proxy library.
//!
//! Fetches `/proxy?url=<target>` on behalf of the caller and rewrites HTML
//! and CSS so every resource they reference is fetched through the proxy too.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod rewrite;
pub mod security;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use rewrite::UrlRewriter;
