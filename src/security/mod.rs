//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits.rs (bounded body read)
//!     → headers.rs (strip hop-by-hop, host, referer)
//!     → Forward to target
//!
//! Upstream response:
//!     → headers.rs (strip framing headers before relay)
//! ```
//!
//! # Design Decisions
//! - Scheme checks happen before any network activity
//! - No trust in client input: the target URL is parsed, never concatenated

pub mod headers;
pub mod limits;
