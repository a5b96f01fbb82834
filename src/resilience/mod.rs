//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to target:
//!     → timeouts.rs (deadline on the upstream response and buffered bodies)
//!     → On expiry: future dropped, connection released, 504 returned
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - No automatic retries: the browser retries through navigation/reload
//! - Streamed passthrough bodies are not deadline-bound (large media must finish)

pub mod timeouts;
