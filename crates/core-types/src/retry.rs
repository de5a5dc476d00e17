use std::time::Duration;

use serde::{Deserialize, Serialize};

const MAX_BACKOFF_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    #[default]
    None,
    Linear,
    Exp,
}

/// Declared retry policy of a step: `count` extra attempts after the first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub count: u32,
    #[serde(default, rename = "interval")]
    pub interval_ms: u64,
    #[serde(default)]
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(count: u32, interval_ms: u64, backoff: Backoff) -> Self {
        Self {
            count,
            interval_ms,
            backoff,
        }
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.count.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based), capped at 60 seconds.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = self.interval_ms;
        let total_ms = match self.backoff {
            Backoff::None => base,
            Backoff::Linear => base.saturating_mul(u64::from(retry.max(1))),
            Backoff::Exp => {
                let multiplier = 2u64.saturating_pow(retry.saturating_sub(1));
                base.saturating_mul(multiplier)
            }
        };
        Duration::from_millis(total_ms.min(MAX_BACKOFF_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, 1000, Backoff::Exp);
        assert_eq!(policy.delay_for(1).as_millis(), 1000);
        assert_eq!(policy.delay_for(2).as_millis(), 2000);
        assert_eq!(policy.delay_for(3).as_millis(), 4000);
        assert_eq!(policy.delay_for(10).as_millis(), 60_000);
    }

    #[test]
    fn linear_and_flat_backoff() {
        assert_eq!(
            RetryPolicy::new(2, 250, Backoff::Linear).delay_for(3).as_millis(),
            750
        );
        assert_eq!(
            RetryPolicy::new(2, 250, Backoff::None).delay_for(3).as_millis(),
            250
        );
    }

    #[test]
    fn max_attempts_counts_first_try() {
        assert_eq!(RetryPolicy::new(3, 0, Backoff::None).max_attempts(), 4);
        assert_eq!(RetryPolicy::default().max_attempts(), 1);
    }
}
