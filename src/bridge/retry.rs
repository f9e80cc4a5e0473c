// ABOUTME: Bounded retry bookkeeping for the broker reconnect loop
// ABOUTME: Fixed-interval attempts, counter reset on success, exhaustion after max failures

use tracing::{debug, warn};

/// Tracks consecutive reconnect failures against a configured budget.
///
/// Only the reconnect loop retries anything in this system; the policy is a
/// plain counter, not a backoff schedule. The loop drives it:
///
/// 1. attempt a reconnect
/// 2. call [`on_success`](Self::on_success) or [`on_failure`](Self::on_failure)
/// 3. stop when [`is_exhausted`](Self::is_exhausted) turns true
#[derive(Debug)]
pub struct ReconnectPolicy {
    max_retries: u32,
    retries: u32,
}

impl ReconnectPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            retries: 0,
        }
    }

    /// Reset the failure counter after a successful reconnect.
    pub fn on_success(&mut self) {
        if self.retries > 0 {
            debug!(retries = self.retries, "reconnect succeeded, resetting retries");
        }
        self.retries = 0;
    }

    /// Record a failed reconnect attempt.
    pub fn on_failure(&mut self) {
        self.retries += 1;
        warn!(
            retries = self.retries,
            max = self.max_retries,
            "reconnect attempt failed"
        );
    }

    /// True once the failure budget is used up.
    pub fn is_exhausted(&self) -> bool {
        self.retries >= self.max_retries
    }

    /// Consecutive failures recorded so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_after_max_failures_never_earlier() {
        let mut policy = ReconnectPolicy::new(3);
        assert!(!policy.is_exhausted());

        policy.on_failure();
        policy.on_failure();
        assert!(!policy.is_exhausted());

        policy.on_failure();
        assert!(policy.is_exhausted());
        assert_eq!(policy.retries(), 3);
    }

    #[test]
    fn success_resets_the_counter() {
        let mut policy = ReconnectPolicy::new(2);
        policy.on_failure();
        policy.on_success();
        assert_eq!(policy.retries(), 0);

        policy.on_failure();
        assert!(!policy.is_exhausted());
        policy.on_failure();
        assert!(policy.is_exhausted());
    }

    #[test]
    fn zero_budget_is_immediately_exhausted() {
        let policy = ReconnectPolicy::new(0);
        assert!(policy.is_exhausted());
    }
}
