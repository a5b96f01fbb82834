//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, landing page fallback)
//!     → request.rs (request ID, `url` validation, header filter, body)
//!     → forward.rs (upstream fetch, content-type dispatch)
//!         → rewrite::html / rewrite::css (buffered)
//!         → passthrough stream (unbuffered)
//!     → error.rs (failures rendered as {"error": ...})
//!     → Send to client
//! ```

pub mod error;
pub mod forward;
pub mod request;
pub mod server;

pub use error::ProxyError;
pub use forward::Forwarder;
pub use request::{ProxyRequest, X_REQUEST_ID};
pub use server::HttpServer;
