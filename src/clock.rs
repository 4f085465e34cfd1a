use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic time source. Every timer in the room (respawn, invulnerability,
/// regen, reload, fire cooldown) reads `now()` from whatever Clock the Room was
/// built with, rather than calling `Instant::now()` directly, so tests can drive
/// time deterministically instead of sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Real wall-clock time, used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only advances when told to. `base` anchors the returned
/// `Instant`s to a real instant captured once at construction; `offset_ms`
/// is added on top for every `now()` call.
pub struct ManualClock {
    base: Instant,
    offset_ms: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: Instant::now(),
            offset_ms: AtomicU64::new(0),
        })
    }

    pub fn advance(&self, duration: Duration) {
        self.offset_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_offset_ms(&self, offset_ms: u64) {
        self.offset_ms.store(offset_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_only_when_told() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0, "clock must not move on its own");
        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.now(), t0 + Duration::from_millis(500));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a, "system clock went backwards");
    }
}
