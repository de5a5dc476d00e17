//! Failure handling strategies

use crate::types::FailureStrategy;
use async_trait::async_trait;
use soulflow_core_types::RetryPolicy;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

/// Failure handler trait
#[async_trait]
pub trait FailureHandler: Send + Sync {
    /// Decides what happens after a failed attempt. A retry decision has
    /// already waited out its backoff when it is returned.
    async fn handle_failure(
        &self,
        step_id: &str,
        retry: Option<RetryPolicy>,
        strategy: FailureStrategy,
        error: &str,
        attempt: u32,
    ) -> FailureDecision;

    /// Check if retry should be attempted
    fn should_retry(&self, retry: Option<RetryPolicy>, attempt: u32) -> bool;

    /// Calculate backoff duration before the next attempt
    fn calculate_backoff(&self, retry: Option<RetryPolicy>, attempt: u32) -> Duration;
}

/// Result of failure handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureDecision {
    /// Halt the run
    Abort(String),

    /// Record the failure and move to the next step
    Continue(String),

    /// Run the same step again
    Retry { attempt: u32, backoff_ms: u64 },
}

/// Default failure handler implementation
pub struct DefaultFailureHandler;

impl DefaultFailureHandler {
    /// Create a new default failure handler
    pub fn new() -> Self {
        Self
    }
}

impl Default for DefaultFailureHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FailureHandler for DefaultFailureHandler {
    async fn handle_failure(
        &self,
        step_id: &str,
        retry: Option<RetryPolicy>,
        strategy: FailureStrategy,
        error: &str,
        attempt: u32,
    ) -> FailureDecision {
        if self.should_retry(retry, attempt) {
            let backoff = self.calculate_backoff(retry, attempt);
            info!(
                "Step {} failed (attempt {}), retrying after {}ms",
                step_id,
                attempt,
                backoff.as_millis()
            );
            sleep(backoff).await;
            return FailureDecision::Retry {
                attempt: attempt + 1,
                backoff_ms: backoff.as_millis() as u64,
            };
        }

        let message = if attempt > 1 {
            format!("failed after {attempt} attempts: {error}")
        } else {
            error.to_string()
        };

        match strategy {
            FailureStrategy::Stop => {
                warn!("Step {} failed, stopping run: {}", step_id, message);
                FailureDecision::Abort(message)
            }
            FailureStrategy::Continue => {
                warn!("Step {} failed, continuing to next step: {}", step_id, message);
                FailureDecision::Continue(message)
            }
        }
    }

    fn should_retry(&self, retry: Option<RetryPolicy>, attempt: u32) -> bool {
        retry.is_some_and(|policy| attempt < policy.max_attempts())
    }

    fn calculate_backoff(&self, retry: Option<RetryPolicy>, attempt: u32) -> Duration {
        retry
            .map(|policy| policy.delay_for(attempt))
            .unwrap_or(Duration::ZERO)
    }
}
