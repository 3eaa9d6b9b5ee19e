//! Wall-clock access
//!
//! Event pastness is derived from the local wall clock on every check, so the
//! clock is injected rather than read directly.

use std::sync::Mutex;

use chrono::{Local, NaiveDateTime, Utc};

pub trait Clock: Send + Sync {
    /// Local wall-clock time, used to compare against event date + start time
    fn now_local(&self) -> NaiveDateTime;

    fn now_utc(&self) -> chrono::DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_local(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn now_utc(&self) -> chrono::DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a settable instant
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now_local(&self) -> NaiveDateTime {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn now_utc(&self) -> chrono::DateTime<Utc> {
        self.now_local().and_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_fixed_clock_advances() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap();
        let clock = FixedClock::new(start);
        clock.advance(chrono::Duration::hours(2));
        assert_eq!(clock.now_local(), start + chrono::Duration::hours(2));
    }
}
