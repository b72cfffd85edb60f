//! Microsecond clocks used for pacing decisions.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// Date in microseconds in the host clock domain.
pub type Mtime = i64;

pub const MTIME_PER_SECOND: Mtime = 1_000_000;

/// Source of the current date. Packet timestamps must be expressed in the
/// same domain.
pub trait Clock: Send + Sync {
    fn now(&self) -> Mtime;
}

/// Monotonic clock counting from its creation.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Mtime {
        self.epoch.elapsed().as_micros() as Mtime
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: Mtime) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: Mtime) {
        self.now.store(now, Ordering::Release);
    }

    pub fn advance(&self, delta: Mtime) {
        self.now.fetch_add(delta, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Mtime {
        self.now.load(Ordering::Acquire)
    }
}

#[test]
fn manual_clock_moves_on_request() {
    let clock = ManualClock::new(1_000);
    assert_eq!(clock.now(), 1_000);

    clock.advance(32_000);
    assert_eq!(clock.now(), 33_000);

    clock.set(5);
    assert_eq!(clock.now(), 5);
}
