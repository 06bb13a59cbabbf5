//! TEAM_462: Monotonic time for bounded waits.
//!
//! Device reads take a timeout in microseconds. A [`Deadline`] is computed
//! once from a [`Clock`] and polled while spinning.

/// A free-running microsecond counter.
pub trait Clock: Send + Sync {
    /// Microseconds since an arbitrary epoch. Must never go backwards.
    fn now_us(&self) -> u64;

    /// Spin until `us` microseconds have elapsed.
    fn delay_us(&self, us: u64) {
        let start = self.now_us();
        while self.now_us().wrapping_sub(start) < us {
            core::hint::spin_loop();
        }
    }
}

/// Point in time after which a wait gives up. `None` waits forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<u64>,
}

impl Deadline {
    pub const fn never() -> Self {
        Self { at: None }
    }

    /// Deadline `timeout_us` from now. A timeout of zero means no deadline.
    pub fn after(clock: &dyn Clock, timeout_us: u64) -> Self {
        if timeout_us == 0 {
            Self::never()
        } else {
            Self {
                at: Some(clock.now_us().saturating_add(timeout_us)),
            }
        }
    }

    pub fn reached(&self, clock: &dyn Clock) -> bool {
        match self.at {
            Some(at) => clock.now_us() >= at,
            None => false,
        }
    }

    pub fn is_never(&self) -> bool {
        self.at.is_none()
    }
}

/// Host clock backed by `std::time::Instant`.
#[cfg(any(test, feature = "std"))]
pub struct StdClock {
    start: std::time::Instant,
}

#[cfg(any(test, feature = "std"))]
impl StdClock {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "std"))]
impl Clock for StdClock {
    fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockClock;

    #[test]
    fn test_zero_timeout_never_expires() {
        let clock = MockClock::new(0, 1_000);
        let d = Deadline::after(&clock, 0);
        assert!(d.is_never());
        for _ in 0..100 {
            assert!(!d.reached(&clock));
        }
    }

    #[test]
    fn test_deadline_expires() {
        let clock = MockClock::new(100, 0);
        let d = Deadline::after(&clock, 50);
        assert!(!d.reached(&clock));
        clock.advance(49);
        assert!(!d.reached(&clock));
        clock.advance(1);
        assert!(d.reached(&clock));
    }

    #[test]
    fn test_deadline_saturates() {
        let clock = MockClock::new(u64::MAX - 1, 0);
        let d = Deadline::after(&clock, 10);
        assert!(!d.reached(&clock));
        clock.advance(1);
        assert!(d.reached(&clock));
    }

    #[test]
    fn test_std_clock_delay() {
        let clock = StdClock::new();
        let start = clock.now_us();
        clock.delay_us(200);
        assert!(clock.now_us() - start >= 200);
    }
}
