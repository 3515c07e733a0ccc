use std::sync::RwLock;

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Source of "now" for everything in the crate that stamps or windows by
/// time. Injected so tests can pin the clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        squash_date(self.now())
    }
}

/// Wall-clock implementation used in production wiring.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for deterministic tests.
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap()
    }
}

/// Collapses an instant to its calendar day, the grain snapshots are keyed
/// by. One squashed date means at most one snapshot per entity per day.
pub fn squash_date(instant: DateTime<Utc>) -> NaiveDate {
    instant.date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squash_date_drops_the_time_component() {
        let morning = "2024-03-05T08:15:00Z".parse::<DateTime<Utc>>().unwrap();
        let evening = "2024-03-05T23:59:59Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(squash_date(morning), squash_date(evening));
        assert_eq!(
            squash_date(morning),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
        );
    }

    #[test]
    fn fixed_clock_advances_on_demand() {
        let clock = FixedClock::new("2024-03-05T08:15:00Z".parse().unwrap());
        let before = clock.now();
        clock.advance(Duration::hours(26));
        assert_eq!(clock.now() - before, Duration::hours(26));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 6).unwrap());
    }
}
