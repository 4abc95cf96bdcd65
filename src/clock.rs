use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Injectable time source. All window math in the admission path reads
/// through here, never through `SystemTime::now()` directly, so tests can
/// drive the ledger and activator deterministically (spec.md §9).
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> i64;
}

/// Production clock: integer seconds since the Unix epoch.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
    }
}

/// Test clock pinned to a value until explicitly advanced.
#[derive(Debug)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self { now: AtomicI64::new(now) }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: i64) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_holds_its_initial_value() {
        let clock = FixedClock::new(1000);
        assert_eq!(clock.now(), 1000);
        assert_eq!(clock.now(), 1000);
    }

    #[test]
    fn set_overrides_the_current_value() {
        let clock = FixedClock::new(1000);
        clock.set(5000);
        assert_eq!(clock.now(), 5000);
    }

    #[test]
    fn advance_accumulates_deltas() {
        let clock = FixedClock::new(0);
        clock.advance(30);
        clock.advance(-10);
        assert_eq!(clock.now(), 20);
    }

    #[test]
    fn system_clock_reports_a_plausible_unix_timestamp() {
        let clock = SystemClock;
        // Any date past 2020-01-01 in seconds since the epoch.
        assert!(clock.now() > 1_577_836_800);
    }
}
