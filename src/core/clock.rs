//! Time source and identifier generation.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Source of "now".
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and benchmarks.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Set the clock to `to`.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Hands out strictly increasing timestamps.
///
/// Two mutations within the same clock tick still get distinct, ordered
/// `updatedAt` values: a reading that does not move past the last issued
/// timestamp is bumped by one millisecond.
#[derive(Debug, Clone)]
pub struct Timestamps {
    clock: Arc<dyn Clock>,
    last: Option<DateTime<Utc>>,
}

impl Timestamps {
    /// Wrap a clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, last: None }
    }

    /// Next timestamp, strictly after every timestamp issued before.
    pub fn next(&mut self) -> DateTime<Utc> {
        let now = self.clock.now();
        let stamp = match self.last {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last = Some(stamp);
        stamp
    }

    /// Record a timestamp seen elsewhere (e.g. loaded from storage) so later
    /// stamps sort after it.
    pub fn observe(&mut self, seen: DateTime<Utc>) {
        if self.last.map_or(true, |last| seen > last) {
            self.last = Some(seen);
        }
    }
}

/// Generate a new unique id.
///
/// UUID v7: a millisecond timestamp prefix followed by random bits, rendered
/// without hyphens. Ids sort by creation time.
pub fn generate_id() -> String {
    uuid::Uuid::now_v7().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_timestamps_strictly_increase_on_frozen_clock() {
        let clock = Arc::new(FixedClock::new(at(1_700_000_000)));
        let mut stamps = Timestamps::new(clock);

        let a = stamps.next();
        let b = stamps.next();
        let c = stamps.next();
        assert!(a < b && b < c);
        assert_eq!(b - a, Duration::milliseconds(1));
    }

    #[test]
    fn test_timestamps_follow_clock() {
        let clock = Arc::new(FixedClock::new(at(1_700_000_000)));
        let mut stamps = Timestamps::new(clock.clone());

        let a = stamps.next();
        clock.advance(Duration::seconds(5));
        let b = stamps.next();
        assert_eq!(b - a, Duration::seconds(5));
    }

    #[test]
    fn test_observe_moves_floor() {
        let clock = Arc::new(FixedClock::new(at(100)));
        let mut stamps = Timestamps::new(clock);

        stamps.observe(at(200));
        assert!(stamps.next() > at(200));
    }

    #[test]
    fn test_generate_id_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 1000);
        assert!(ids.iter().all(|id| id.len() == 32));
    }
}
