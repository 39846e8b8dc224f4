use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

/// Millisecond time source used for key history, cooldowns and toast expiry.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> f64;
}

/// Monotonic clock measured from the moment it was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock that only moves when told to. Scripted sessions and tests use it.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ms: f64) -> Self {
        Self { now: Mutex::new(ms) }
    }

    pub fn advance(&self, ms: f64) {
        *self.now.lock() += ms.max(0.0);
    }

    pub fn set(&self, ms: f64) {
        *self.now.lock() = ms;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        *self.now.lock()
    }
}

impl<T> Clock for Arc<T>
where
    T: Clock + ?Sized,
{
    fn now_ms(&self) -> f64 {
        (**self).now_ms()
    }
}
