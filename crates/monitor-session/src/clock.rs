//! Wall-clock source

use monitor_common::{now_millis, TimestampMillis};
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of `now` for ticket timestamps and urgency
pub trait Clock: Send + Sync {
    fn now(&self) -> TimestampMillis;
}

/// System time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimestampMillis {
        now_millis()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(start: TimestampMillis) -> Self {
        Self(AtomicI64::new(start))
    }

    pub fn advance(&self, millis: i64) {
        self.0.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> TimestampMillis {
        self.0.load(Ordering::SeqCst)
    }
}
