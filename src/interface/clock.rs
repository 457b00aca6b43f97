use chrono::Utc;

/// Time source for `last_updated` timestamps and the age rule.
///
/// Injected so reconciliation and validation are deterministic in tests.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall-clock implementation.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::atomic::{AtomicI64, Ordering};

    use super::Clock;

    /// Manually advanced clock for tests.
    pub struct FixedClock(AtomicI64);

    impl FixedClock {
        pub fn at(ms: i64) -> Self {
            Self(AtomicI64::new(ms))
        }

        pub fn advance(&self, ms: i64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for FixedClock {
        fn now_ms(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }
}
