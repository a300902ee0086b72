//! Back-off between fallback attempts.
//!
//! Providers behind the chain frequently share an upstream (a gateway, a
//! quota pool), so a burst of failures on one tends to hit the next. A short
//! exponential pause between consecutive call failures spreads the load.
//! Skipped providers (no adapter) never count as failures and cause no pause.

use std::time::Duration;

/// Delay schedule between consecutive provider failures.
///
/// ```rust
/// # use muninn::FallbackDelay;
/// # use std::time::Duration;
/// let delay = FallbackDelay::new()
///     .initial_delay(Duration::from_millis(100))
///     .max_delay(Duration::from_secs(1));
/// assert_eq!(delay.delay_for_attempt(2), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackDelay {
    /// Pause after the first failure. Default: 250ms.
    pub initial_delay: Duration,
    /// Cap on the exponential growth. Default: 2s.
    pub max_delay: Duration,
}

impl Default for FallbackDelay {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl FallbackDelay {
    /// Create a new schedule with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// No pause between attempts.
    pub fn disabled() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Set the pause after the first failure.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum pause.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Pause after the `n`-th consecutive failure (0-indexed).
    ///
    /// `initial_delay * 2^n`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, n: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(n))
            .min(self.max_delay)
    }

    pub fn is_disabled(&self) -> bool {
        self.initial_delay.is_zero() || self.max_delay.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_then_capped() {
        let delay = FallbackDelay::new();
        assert_eq!(delay.delay_for_attempt(0), Duration::from_millis(250));
        assert_eq!(delay.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(delay.delay_for_attempt(3), Duration::from_secs(2));
        assert_eq!(delay.delay_for_attempt(40), Duration::from_secs(2));
    }

    #[test]
    fn disabled_is_zero() {
        let delay = FallbackDelay::disabled();
        assert!(delay.is_disabled());
        assert_eq!(delay.delay_for_attempt(5), Duration::ZERO);
    }
}
