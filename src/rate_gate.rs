use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Process-wide throttle consulted before every remote call.
///
/// `acquire` never fails; it only delays the caller until its slot arrives.
pub trait RateGate: Send + Sync {
    fn acquire(&self);
}

/// Time source for [`IntervalGate`]; swapped for [`ManualClock`] in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Deterministic clock: `sleep` advances time instantly.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|poison| poison.into_inner());
        *offset += duration;
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Strict periodic gate: consecutive acquisitions start at least `interval`
/// apart, with no burst allowance.
///
/// The mutex guards only the cursor. A caller reserves the next slot while
/// holding it and sleeps after releasing it, so concurrent callers queue up
/// on distinct slots instead of serializing their sleeps.
pub struct IntervalGate<C: Clock = SystemClock> {
    clock: C,
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl IntervalGate<SystemClock> {
    /// # Panics
    ///
    /// Panics if `calls_per_second` is zero.
    pub fn per_second(calls_per_second: u32) -> Self {
        Self::with_clock(SystemClock, interval_for_rate(calls_per_second))
    }
}

impl<C: Clock> IntervalGate<C> {
    pub fn with_clock(clock: C, interval: Duration) -> Self {
        Self {
            clock,
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn reserve(&self) -> Instant {
        let mut next = self
            .next_slot
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let now = self.clock.now();
        let slot = match *next {
            Some(permitted) if permitted > now => permitted,
            _ => now,
        };
        *next = Some(slot + self.interval);
        slot
    }
}

impl<C: Clock> RateGate for IntervalGate<C> {
    fn acquire(&self) {
        let slot = self.reserve();
        let now = self.clock.now();
        if slot > now {
            self.clock.sleep(slot - now);
        }
    }
}

/// Gate that never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnthrottledGate;

impl RateGate for UnthrottledGate {
    fn acquire(&self) {}
}

pub fn interval_for_rate(calls_per_second: u32) -> Duration {
    assert!(calls_per_second > 0, "calls_per_second must be positive");
    Duration::from_secs(1) / calls_per_second
}
