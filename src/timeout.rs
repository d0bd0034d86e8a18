//! Deadline guard for external service calls
//!
//! Races an operation against a timer so a hung collaborator becomes an
//! explicit failure instead of a stalled turn. All three collaborator calls
//! (transcription, dialogue, synthesis) go through the same guard, giving
//! the controller one failure shape per external call.

use std::future::Future;
use std::time::Duration;

use crate::{Error, Result};

/// Default deadline for guarded calls
pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(10_000);

/// Run `op` with a deadline
///
/// When the timer fires first the operation future is dropped — its
/// eventual resolution has no further effect — and the failure is reported
/// as [`Error::Timeout`], distinct from whatever the operation itself might
/// have returned.
///
/// # Errors
///
/// Returns [`Error::Timeout`] when the deadline elapses, or the operation's
/// own error when it fails in time.
pub async fn guard<T, F>(phase: &str, deadline: Duration, op: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, op).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(phase, ?deadline, "call timed out");
            Err(Error::Timeout(phase.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn resolves_within_deadline() {
        let result = guard("test", Duration::from_secs(10), async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn late_operation_reported_as_timeout() {
        let result = guard("test", Duration::from_secs(10), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(42)
        })
        .await;

        assert!(result.unwrap_err().is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn operation_error_is_not_a_timeout() {
        let result: Result<u32> = guard("test", Duration::from_secs(10), async {
            Err(Error::Transcription("boom".to_string()))
        })
        .await;

        let err = result.unwrap_err();
        assert!(!err.is_timeout());
        assert!(matches!(err, Error::Transcription(_)));
    }
}
