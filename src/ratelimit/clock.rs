//! Calendar-day clock used to bucket counters.

use chrono::{Days, Local, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Source of the current calendar day.
///
/// Implementations must be cheap; the limiter calls `today` once per check.
pub trait Clock: Send + Sync {
    /// The current calendar day.
    fn today(&self) -> NaiveDate;
}

/// Time zone whose midnight marks the start of a new day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayBoundary {
    /// The host's local time zone
    #[default]
    Local,
    /// Coordinated Universal Time
    Utc,
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    zone: DayBoundary,
}

impl SystemClock {
    /// Create a system clock that rolls over at midnight in `zone`.
    pub fn new(zone: DayBoundary) -> Self {
        Self { zone }
    }

    /// The configured day boundary.
    pub fn zone(&self) -> DayBoundary {
        self.zone
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        match self.zone {
            DayBoundary::Local => Local::now().date_naive(),
            DayBoundary::Utc => Utc::now().date_naive(),
        }
    }
}

/// Clock whose day is set explicitly.
#[derive(Debug)]
pub struct ManualClock {
    day: Mutex<NaiveDate>,
}

impl ManualClock {
    /// Create a clock frozen at `day`.
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day: Mutex::new(day),
        }
    }

    /// Move the clock to `day`.
    pub fn set(&self, day: NaiveDate) {
        *self.day.lock() = day;
    }

    /// Move the clock forward by `days`.
    pub fn advance_days(&self, days: u64) {
        let mut day = self.day.lock();
        if let Some(next) = day.checked_add_days(Days::new(days)) {
            *day = next;
        }
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.day.lock()
    }
}
