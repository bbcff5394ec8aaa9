use std::time::Duration;

pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;
pub const DEFAULT_MAX_DELAY_MS: u64 = 8_000;

/// Bounded retries with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    pub fn immediate(retries: u32) -> Self {
        Self {
            retries,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay before the attempt following failed attempt `attempt` (0-based),
    /// or `None` when the budget is spent.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt.saturating_add(1) >= self.max_attempts() {
            return None;
        }
        let exp = 1u64 << attempt.min(30);
        let delay = self.base_delay_ms.saturating_mul(exp).min(self.max_delay_ms);
        Some(Duration::from_millis(delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_include_the_first_call() {
        assert_eq!(RetryPolicy::immediate(0).max_attempts(), 1);
        assert_eq!(RetryPolicy::default().max_attempts(), 3);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            retries: 10,
            base_delay_ms: 500,
            max_delay_ms: 3_000,
        };
        assert_eq!(policy.next_delay(0), Some(Duration::from_millis(500)));
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(1_000)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_millis(2_000)));
        assert_eq!(policy.next_delay(3), Some(Duration::from_millis(3_000)));
    }

    #[test]
    fn no_delay_after_last_attempt() {
        let policy = RetryPolicy::default();
        assert!(policy.next_delay(1).is_some());
        assert_eq!(policy.next_delay(2), None);
    }
}
