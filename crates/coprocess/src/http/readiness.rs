//! Readiness polling with exponential backoff

use std::time::Duration;

/// How long to keep probing a freshly started server
///
/// Delays grow as `initial_delay * multiplier^attempt`, capped at `max_delay`.
/// No jitter: there is exactly one prober per server.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadinessPolicy {
    attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl Default for ReadinessPolicy {
    /// Defaults:
    /// - `attempts`: 20
    /// - `initial_delay`: 50ms
    /// - `max_delay`: 1s
    /// - `multiplier`: 2.0
    fn default() -> Self {
        Self {
            attempts: 20,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl ReadinessPolicy {
    /// Start from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of probes (at least one is always sent)
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Set the delay after the first failed probe
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the longest delay between probes
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the growth factor between delays
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Number of probes to send.
    pub fn max_attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay after failed probe number `attempt` (0-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_grow_then_cap() {
        let policy = ReadinessPolicy::new()
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(500))
            .multiplier(2.0);

        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
        assert_eq!(policy.delay(3), Duration::from_millis(500));
        assert_eq!(policy.delay(30), Duration::from_millis(500));
    }

    #[test]
    fn test_at_least_one_attempt() {
        assert_eq!(ReadinessPolicy::new().attempts(0).max_attempts(), 1);
    }
}
