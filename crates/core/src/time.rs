//! Injected time source
//!
//! Engines never read the system clock directly. Time arrives as unix
//! seconds from an injected `Clock`, which callers treat as only
//! approximately trustworthy - nothing in the core assumes sub-second
//! precision.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic time source in unix seconds.
pub trait Clock: Send + Sync {
    /// Current time as unix seconds
    fn now(&self) -> u64;
}

/// Wall-clock backed implementation.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock fixed at the given unix time
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    /// Advance the clock by `secs` seconds
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jump the clock to an absolute unix time
    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now(), 1_000);
        clock.advance(365 * 24 * 3600);
        assert_eq!(clock.now(), 1_000 + 365 * 24 * 3600);
    }

    #[test]
    fn test_system_clock_nonzero() {
        assert!(SystemClock.now() > 0);
    }
}
