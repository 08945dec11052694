//! Unified retry policy.
//!
//! Both retrying call sites in the workspace — the realtime AI handshake
//! and the booking-store HTTP client — consult the same policy type instead
//! of carrying their own ad-hoc loops.

use std::time::{Duration, Instant};

/// Controls how many times an operation is attempted and how long to wait
/// between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (first try included). Always ≥ 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: f64,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Wall-clock budget across all attempts. `None` = unbounded.
    pub budget: Option<Duration>,
}

impl RetryPolicy {
    /// Policy for the realtime AI handshake: 3 attempts, 1 s apart, total
    /// budget 5 s.
    pub fn ai_handshake() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_secs(1),
            budget: Some(Duration::from_secs(5)),
        }
    }

    /// Policy for booking-store HTTP calls: exponential back-off from
    /// 100 ms, `max_retries` retries after the first attempt.
    pub fn store(max_retries: u32) -> Self {
        Self {
            max_attempts: max_retries + 1,
            initial_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(5),
            budget: None,
        }
    }

    /// Delay to sleep before attempt `attempt` (1-indexed; attempt 0 is the
    /// first try and never sleeps).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = base_ms * self.backoff_factor.powi(attempt as i32 - 1);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// Whether attempt number `attempt` (0-indexed) exceeds the policy.
    pub fn should_give_up(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }

    /// Whether the wall-clock budget has run out since `started`.
    pub fn budget_exhausted(&self, started: Instant) -> bool {
        match self.budget {
            Some(budget) => started.elapsed() >= budget,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ai_handshake_policy_values() {
        let p = RetryPolicy::ai_handshake();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(p.delay_for_attempt(2), Duration::from_secs(1));
        assert_eq!(p.budget, Some(Duration::from_secs(5)));
    }

    #[test]
    fn first_attempt_never_sleeps() {
        assert_eq!(
            RetryPolicy::store(3).delay_for_attempt(0),
            Duration::ZERO
        );
    }

    #[test]
    fn store_backoff_doubles() {
        let p = RetryPolicy::store(3);
        assert_eq!(p.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(p.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(p.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn delay_capped_at_max() {
        let p = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_secs(2),
            backoff_factor: 10.0,
            max_delay: Duration::from_secs(5),
            budget: None,
        };
        assert_eq!(p.delay_for_attempt(6), Duration::from_secs(5));
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let p = RetryPolicy::ai_handshake();
        assert!(!p.should_give_up(2));
        assert!(p.should_give_up(3));
    }

    #[test]
    fn unbounded_budget_never_exhausts() {
        let p = RetryPolicy::store(2);
        assert!(!p.budget_exhausted(Instant::now()));
    }
}
