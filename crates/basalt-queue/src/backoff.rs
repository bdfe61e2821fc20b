use std::time::Duration;

/// Exponential per-item retry delay, capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound on any single delay.
    pub cap: Duration,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay before the retry that follows `retries` consecutive failures.
    ///
    /// Doubles per failure: `retries = 0` waits `base`, `retries = 1` waits
    /// `2 * base`, and so on up to `cap`.
    pub fn delay(&self, retries: u32) -> Duration {
        let base = self.base.as_nanos().min(u128::from(u64::MAX)) as u64;
        let factor = 1u64 << retries.min(63);
        Duration::from_nanos(base.saturating_mul(factor)).min(self.cap)
    }
}

impl Default for Backoff {
    /// 5 ms doubling up to 1000 s.
    fn default() -> Self {
        Self {
            base: Duration::from_millis(5),
            cap: Duration::from_secs(1000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_retry_waits_base() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(0), Duration::from_millis(5));
    }

    #[test]
    fn delay_doubles_per_failure() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(1), Duration::from_millis(10));
        assert_eq!(backoff.delay(2), Duration::from_millis(20));
        assert_eq!(backoff.delay(5), Duration::from_millis(160));
    }

    #[test]
    fn delay_is_capped() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(30), Duration::from_secs(1000));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(1000));
    }

    #[test]
    fn custom_base_and_cap() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(250));
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(250));
    }
}
