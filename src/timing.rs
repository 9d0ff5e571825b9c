//! Adaptive timeout control
//!
//! Each scanner carries one [`AdaptiveTimeout`] that tracks an EWMA of
//! successful dial latencies and a consecutive-failure streak, and derives
//! the per-dial timeout from them. The derived timeout is always clamped
//! into `[min, max]`. The mutex guards four scalars and is never held
//! across a dial.

use std::{
    sync::Mutex,
    time::Duration,
};

use rand::{thread_rng, Rng};

/// Extra headroom added on top of the latency estimate.
const LATENCY_HEADROOM: Duration = Duration::from_millis(100);

/// Per-step penalty for consecutive dial failures.
const STREAK_STEP: Duration = Duration::from_millis(75);

#[derive(Debug, Default)]
struct AdaptiveState {
    ewma_latency: Duration,
    failure_streak: u32,
    successes: u64,
    failures: u64,
}

/// Adaptive dial-timeout controller.
#[derive(Debug)]
pub struct AdaptiveTimeout {
    enabled: bool,
    /// Static base timeout; doubles as the lower adaptive clamp.
    base: Duration,
    max: Duration,
    state: Mutex<AdaptiveState>,
}

impl AdaptiveTimeout {
    pub fn new(enabled: bool, base: Duration, max: Duration) -> Self {
        Self {
            enabled,
            base,
            max: max.max(base),
            state: Mutex::new(AdaptiveState::default()),
        }
    }

    /// The configured base timeout, unmodified.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Compute the timeout for the next dial.
    pub fn current_timeout(&self) -> Duration {
        if !self.enabled {
            return self.base;
        }

        let (ewma, streak) = {
            let state = self.state.lock().unwrap();
            (state.ewma_latency, state.failure_streak)
        };

        let mut timeout = self.base;
        if ewma > Duration::ZERO {
            timeout = ewma * 3 + LATENCY_HEADROOM;
        }
        timeout = timeout.max(self.base);
        timeout += STREAK_STEP * streak;
        timeout.clamp(self.base, self.max)
    }

    /// Timeout for protocol I/O after the dial: the adaptive value, but
    /// never below `floor`.
    pub fn io_timeout(&self, floor: Duration) -> Duration {
        self.current_timeout().max(floor)
    }

    /// Record the outcome of one dial attempt.
    pub fn record_outcome(&self, success: bool, latency: Duration) {
        let mut state = self.state.lock().unwrap();
        if success {
            state.successes += 1;
            state.failure_streak = 0;
            if state.ewma_latency == Duration::ZERO {
                state.ewma_latency = latency;
            } else {
                // 75% historical + 25% newest keeps the estimate stable
                // under bursty conditions.
                state.ewma_latency = (state.ewma_latency * 3 + latency) / 4;
            }
        } else {
            state.failures += 1;
            state.failure_streak += 1;
        }
    }

    #[cfg(test)]
    fn failure_streak(&self) -> u32 {
        self.state.lock().unwrap().failure_streak
    }
}

/// Exponential backoff with jitter for dial retries.
///
/// `backoff(i) = base * 2^i`, capped at `max`, plus a uniform 0..50%
/// jitter to avoid synchronized retry storms.
pub fn retry_backoff(base: Duration, max: Duration, attempt: u32) -> Duration {
    let mut delay = base;
    for _ in 0..attempt {
        delay *= 2;
        if delay >= max {
            delay = max;
            break;
        }
    }

    let jitter_max = (delay.as_millis() as u64 / 2).max(1);
    let jitter = Duration::from_millis(thread_rng().gen_range(0..jitter_max));
    delay + jitter
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> AdaptiveTimeout {
        AdaptiveTimeout::new(
            true,
            Duration::from_millis(500),
            Duration::from_secs(4),
        )
    }

    #[test]
    fn test_base_timeout_before_first_success() {
        let adaptive = controller();
        assert_eq!(adaptive.current_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_disabled_always_returns_base() {
        let adaptive = AdaptiveTimeout::new(false, Duration::from_millis(500), Duration::from_secs(4));
        adaptive.record_outcome(false, Duration::ZERO);
        adaptive.record_outcome(false, Duration::ZERO);
        assert_eq!(adaptive.current_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_ewma_drives_timeout() {
        let adaptive = controller();
        adaptive.record_outcome(true, Duration::from_millis(200));
        // first success seeds the EWMA directly: 3*200 + 100 = 700ms
        assert_eq!(adaptive.current_timeout(), Duration::from_millis(700));

        adaptive.record_outcome(true, Duration::from_millis(400));
        // EWMA = (3*200 + 400) / 4 = 250ms -> 3*250 + 100 = 850ms
        assert_eq!(adaptive.current_timeout(), Duration::from_millis(850));
    }

    #[test]
    fn test_failure_streak_raises_timeout() {
        let adaptive = controller();
        adaptive.record_outcome(false, Duration::ZERO);
        adaptive.record_outcome(false, Duration::ZERO);
        assert_eq!(adaptive.failure_streak(), 2);
        assert_eq!(adaptive.current_timeout(), Duration::from_millis(650));
    }

    #[test]
    fn test_success_clears_streak() {
        let adaptive = controller();
        adaptive.record_outcome(false, Duration::ZERO);
        adaptive.record_outcome(false, Duration::ZERO);
        adaptive.record_outcome(true, Duration::from_millis(50));
        assert_eq!(adaptive.failure_streak(), 0);
    }

    #[test]
    fn test_timeout_clamped_to_max() {
        let adaptive = controller();
        adaptive.record_outcome(true, Duration::from_secs(10));
        for _ in 0..100 {
            adaptive.record_outcome(false, Duration::ZERO);
        }
        assert_eq!(adaptive.current_timeout(), Duration::from_secs(4));
    }

    #[test]
    fn test_timeout_never_below_base() {
        let adaptive = controller();
        adaptive.record_outcome(true, Duration::from_millis(1));
        assert!(adaptive.current_timeout() >= Duration::from_millis(500));
    }

    #[test]
    fn test_io_timeout_floor() {
        let adaptive = controller();
        assert_eq!(
            adaptive.io_timeout(Duration::from_millis(900)),
            Duration::from_millis(900)
        );
        assert_eq!(
            adaptive.io_timeout(Duration::from_millis(100)),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_retry_backoff_bounds() {
        let base = Duration::from_millis(25);
        let max = Duration::from_millis(600);
        for attempt in 0..8 {
            let delay = retry_backoff(base, max, attempt);
            let expected = std::cmp::min(base * 2u32.pow(attempt), max);
            assert!(delay >= expected, "attempt {attempt}: {delay:?} < {expected:?}");
            assert!(
                delay <= expected + expected / 2 + Duration::from_millis(1),
                "attempt {attempt}: {delay:?} too large"
            );
        }
    }
}
