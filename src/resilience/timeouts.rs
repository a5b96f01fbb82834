//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream calls with a deadline
//! - Cancel the wrapped operation cleanly when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - Timed-out requests return 504 Gateway Timeout

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Outcome of a deadline-bound operation that did not succeed.
#[derive(Debug, Error)]
pub enum Deadline<E> {
    /// The operation did not finish in time and was dropped.
    #[error("deadline of {0:?} elapsed")]
    Elapsed(Duration),

    /// The operation finished with its own error.
    #[error(transparent)]
    Failed(E),
}

/// Run `fut` to completion or until `limit` passes.
pub async fn with_deadline<F, T, E>(limit: Duration, fut: F) -> Result<T, Deadline<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Deadline::Failed(e)),
        Err(_) => Err(Deadline::Elapsed(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_in_time() {
        let out: Result<u32, Deadline<std::io::Error>> =
            with_deadline(Duration::from_millis(100), async { Ok(7) }).await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_inner_error_kept() {
        let out: Result<(), Deadline<&str>> =
            with_deadline(Duration::from_millis(100), async { Err("boom") }).await;
        assert!(matches!(out, Err(Deadline::Failed("boom"))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed() {
        let out: Result<(), Deadline<std::io::Error>> = with_deadline(Duration::from_secs(15), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert!(matches!(out, Err(Deadline::Elapsed(d)) if d == Duration::from_secs(15)));
    }
}
