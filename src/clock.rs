//! Injected time source.
//!
//! Throttling and staleness decisions depend on elapsed time, so the core
//! takes its clock through this trait rather than calling `Instant::now()`
//! directly. Production code uses [`SystemClock`]; tests drive a
//! [`ManualClock`] forward deterministically.

use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

/// A source of monotonic and wall-clock time.
pub trait Clock: Send + Sync {
    /// Monotonic instant, for interval arithmetic.
    fn now(&self) -> Instant;

    /// Wall-clock time, for sample age calculations.
    fn wall(&self) -> SystemTime;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A manually advanced clock for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<(Instant, SystemTime)>,
}

impl ManualClock {
    /// Create a manual clock anchored at the current real time.
    pub fn new() -> Self {
        Self {
            state: Mutex::new((Instant::now(), SystemTime::now())),
        }
    }

    /// Advance both monotonic and wall time by the given duration.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock().unwrap();
        state.0 += by;
        state.1 += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.state.lock().unwrap().0
    }

    fn wall(&self) -> SystemTime {
        self.state.lock().unwrap().1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        let start = clock.now();
        let wall_start = clock.wall();

        clock.advance(Duration::from_secs(30));

        assert_eq!(clock.now() - start, Duration::from_secs(30));
        assert_eq!(
            clock.wall().duration_since(wall_start).unwrap(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_manual_clock_is_frozen_between_advances() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), clock.now());
    }
}
