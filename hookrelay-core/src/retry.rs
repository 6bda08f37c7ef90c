//! The external forwarder's retry policy (§4.5, §9 "retry logic in the
//! external forwarder"): kept as a small declarative structure so the
//! backoff schedule is trivially testable without a fake clock.

use std::time::Duration;

/// `{maxAttempts, initialBackoff, multiplier}` (§9).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// The default external-plugin policy from §4.5: up to 5 attempts,
    /// 100ms initial backoff, doubling (100, 200, 400, 800, 1600ms).
    pub const fn external_default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            multiplier: 2.0,
        }
    }

    /// The backoff delay to sleep *before* attempt number `attempt`
    /// (1-indexed: there is no delay before attempt 1).
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(millis.round() as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::external_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule_matches_spec() {
        let policy = RetryPolicy::external_default();
        let expected = [0, 100, 200, 400, 800];
        for (attempt, expected_ms) in (1..=5u32).zip(expected) {
            assert_eq!(policy.backoff_before(attempt).as_millis() as u64, expected_ms);
        }
    }
}
