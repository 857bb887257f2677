//! Injectable wall clock.
//!
//! Handlers never read system time directly; they ask a `Clock` so that
//! timer logic can be driven deterministically in tests.

use chrono::Utc;

/// Millisecond wall clock.
pub trait Clock: Send + Sync {
    /// Current Unix time in milliseconds.
    fn now_ms(&self) -> u64;

    /// Current Unix time in seconds.
    fn now_secs(&self) -> u64 {
        self.now_ms() / 1000
    }
}

/// System clock backed by chrono.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        Utc::now().timestamp_millis().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_recent() {
        // 2020-01-01 in ms
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
        assert_eq!(SystemClock.now_secs(), SystemClock.now_ms() / 1000);
    }
}
