use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// Source of "now" for window checks and reservation timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar date used for `valid_until` comparisons.
    fn today(&self) -> NaiveDate;
}

/// Wall clock. `today` is the server's local calendar date.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Settable clock for tests and simulations. Time of day is always noon UTC.
#[derive(Debug)]
pub struct FixedClock {
    today: Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Mutex::new(today),
        }
    }

    pub fn set_today(&self, today: NaiveDate) {
        *self.today.lock() = today;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.today().and_time(NaiveTime::default()).and_utc() + TimeDelta::hours(12)
    }

    fn today(&self) -> NaiveDate {
        *self.today.lock()
    }
}
