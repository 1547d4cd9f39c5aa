//! Run-date source.
//!
//! The output file name embeds the run date; the pipeline asks a [`Clock`]
//! for it instead of reading the wall clock directly.

use chrono::NaiveDate;

/// Supplies the current calendar date.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// Always returns the same date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_is_fixed() {
        let date = NaiveDate::from_ymd_opt(2023, 9, 1).unwrap();
        let clock = FixedClock(date);
        assert_eq!(clock.today(), date);
        assert_eq!(clock.today(), date);
    }

    #[test]
    fn system_clock_is_after_epoch() {
        let epoch = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(SystemClock.today() > epoch);
    }
}
