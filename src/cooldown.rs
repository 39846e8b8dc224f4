use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::Clock;

/// Per-resource cooldown timestamps for repeatable world actions.
pub struct Cooldowns {
    clock: Arc<dyn Clock>,
    period_ms: f64,
    last_used: Mutex<HashMap<String, f64>>,
}

impl Cooldowns {
    pub fn new(clock: Arc<dyn Clock>, period_ms: f64) -> Self {
        Self {
            clock,
            period_ms: period_ms.max(0.0),
            last_used: Mutex::new(HashMap::new()),
        }
    }

    /// Claims `resource` if its cooldown has elapsed. A resource that was
    /// never used is always ready.
    pub fn try_use(&self, resource: &str) -> bool {
        let now = self.clock.now_ms();
        let mut last_used = self.last_used.lock();
        if let Some(last) = last_used.get(resource) {
            if now - last < self.period_ms {
                return false;
            }
        }
        last_used.insert(resource.to_string(), now);
        true
    }

    /// Milliseconds until `resource` is ready again.
    pub fn remaining_ms(&self, resource: &str) -> f64 {
        let now = self.clock.now_ms();
        self.last_used
            .lock()
            .get(resource)
            .map(|last| (self.period_ms - (now - last)).max(0.0))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn resources_cool_down_independently() {
        let clock = Arc::new(ManualClock::new());
        let cooldowns = Cooldowns::new(clock.clone(), 12_000.0);
        assert!(cooldowns.try_use("row-0"));
        assert!(!cooldowns.try_use("row-0"));
        assert!(cooldowns.try_use("row-1"));

        clock.advance(11_999.0);
        assert!(!cooldowns.try_use("row-0"));
        assert!((cooldowns.remaining_ms("row-0") - 1.0).abs() < 1e-6);
        clock.advance(1.0);
        assert!(cooldowns.try_use("row-0"));
        assert_eq!(cooldowns.remaining_ms("unused"), 0.0);
    }
}
