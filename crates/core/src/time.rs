//! Wall-clock access behind a trait so evaluation can be pinned in tests.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

/// Source of the current instant.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Returns a settable, frozen instant.
#[derive(Debug)]
pub struct FixedTimeSource {
    now: RwLock<DateTime<Utc>>,
}

impl FixedTimeSource {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Move the frozen clock to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().expect("time source lock poisoned") = now;
    }

    /// Advance the frozen clock by `by`.
    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.write().expect("time source lock poisoned");
        *guard += by;
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().expect("time source lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_source_can_be_moved() {
        let start = Utc.with_ymd_and_hms(2026, 10, 19, 11, 58, 0).unwrap();
        let source = FixedTimeSource::new(start);
        assert_eq!(source.now(), start);

        source.advance(chrono::Duration::minutes(2));
        assert_eq!(source.now(), start + chrono::Duration::minutes(2));

        source.set(start);
        assert_eq!(source.now(), start);
    }
}
