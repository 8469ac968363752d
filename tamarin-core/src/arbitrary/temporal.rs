use super::CombinableArbitrary;
use crate::error::{Result, TamarinError};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};

fn default_min() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn default_max() -> NaiveDate {
    NaiveDate::from_ymd_opt(2099, 12, 31).unwrap_or(NaiveDate::MAX)
}

fn empty(what: &str, min: impl std::fmt::Display, max: impl std::fmt::Display) -> TamarinError {
    TamarinError::ConstraintConflict {
        property: what.to_string(),
        message: format!("range {min} to {max} is empty"),
    }
}

/// Calendar date generator spec; both bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateArbitrary {
    min: NaiveDate,
    max: NaiveDate,
}

impl Default for DateArbitrary {
    fn default() -> Self {
        DateArbitrary {
            min: default_min(),
            max: default_max(),
        }
    }
}

impl DateArbitrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(mut self, min: NaiveDate, max: NaiveDate) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Only dates on or after `min`.
    pub fn after(mut self, min: NaiveDate) -> Self {
        self.min = min;
        if self.max < min {
            self.max = min + Duration::days(3_650);
        }
        self
    }

    /// Only dates on or before `max`.
    pub fn before(mut self, max: NaiveDate) -> Self {
        self.max = max;
        if self.min > max {
            self.min = max - Duration::days(3_650);
        }
        self
    }

    pub fn build(&self) -> Result<CombinableArbitrary<NaiveDate>> {
        let (min, max) = (self.min, self.max);
        if min > max {
            return Err(empty("date", min, max));
        }
        let (lo, hi) = (min.num_days_from_ce(), max.num_days_from_ce());
        Ok(CombinableArbitrary::from_fn(move |source| {
            let day = source.int_in(lo as i128, hi as i128) as i32;
            NaiveDate::from_num_days_from_ce_opt(day)
                .ok_or_else(|| TamarinError::conversion("NaiveDate", format!("day {day}")))
        }))
    }
}

/// Date-time generator spec with second precision; both bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeArbitrary {
    min: NaiveDateTime,
    max: NaiveDateTime,
}

impl Default for DateTimeArbitrary {
    fn default() -> Self {
        DateTimeArbitrary {
            min: default_min().and_time(Default::default()),
            max: default_max().and_hms_opt(23, 59, 59).unwrap_or(NaiveDateTime::MAX),
        }
    }
}

impl DateTimeArbitrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(mut self, min: NaiveDateTime, max: NaiveDateTime) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn after(mut self, min: NaiveDateTime) -> Self {
        self.min = min;
        if self.max < min {
            self.max = min + Duration::days(3_650);
        }
        self
    }

    pub fn before(mut self, max: NaiveDateTime) -> Self {
        self.max = max;
        if self.min > max {
            self.min = max - Duration::days(3_650);
        }
        self
    }

    pub fn build(&self) -> Result<CombinableArbitrary<NaiveDateTime>> {
        let (min, max) = (self.min, self.max);
        if min > max {
            return Err(empty("date-time", min, max));
        }
        let (lo, hi) = (min.and_utc().timestamp(), max.and_utc().timestamp());
        Ok(CombinableArbitrary::from_fn(move |source| {
            let seconds = source.int_in(lo as i128, hi as i128) as i64;
            DateTime::from_timestamp(seconds, 0)
                .map(|at| at.naive_utc())
                .ok_or_else(|| TamarinError::conversion("NaiveDateTime", format!("{seconds}s")))
        }))
    }
}
