//! Deadlines and cancellation for remote calls.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{RagError, Result};

/// Bounds for a single remote call: a deadline plus a cancellation token
/// shared with whoever may abort the surrounding user action.
#[derive(Debug, Clone)]
pub struct CallBudget {
    timeout: Duration,
    cancel: CancellationToken,
}

impl CallBudget {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }

    /// A budget with the given deadline and a fresh, never-cancelled token.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, CancellationToken::new())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `call` against `service`, failing with [`RagError::Upstream`] if
    /// the deadline elapses or the token is cancelled first.
    pub async fn run<T, F>(&self, service: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!(service, "call cancelled");
                Err(RagError::upstream(service, "call cancelled"))
            }
            outcome = tokio::time::timeout(self.timeout, call) => match outcome {
                Ok(result) => result,
                Err(_) => {
                    warn!(service, timeout_ms = self.timeout.as_millis() as u64, "call timed out");
                    Err(RagError::upstream(
                        service,
                        format!("timed out after {}ms", self.timeout.as_millis()),
                    ))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out_as_upstream_error() {
        let budget = CallBudget::with_timeout(Duration::from_millis(50));
        let err = budget
            .run("slow", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn cancelled_token_aborts_call() {
        let token = CancellationToken::new();
        token.cancel();
        let budget = CallBudget::new(Duration::from_secs(5), token);
        let err = budget.run("any", async { Ok(1) }).await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[tokio::test]
    async fn fast_call_passes_result_through() {
        let budget = CallBudget::with_timeout(Duration::from_secs(1));
        assert_eq!(budget.run("fast", async { Ok(7) }).await.unwrap(), 7);
    }
}
