//! Period resolution.
//!
//! Every aggregation matches `start <= date < end`. A day range covers the
//! `to` day fully by ending at the next midnight; a month ends at the first
//! of the following month. Midnights are taken in the reporting timezone.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use super::error::AnalyticsError;
use super::types::PeriodQuery;

/// A resolved half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    /// Inclusive lower bound.
    pub start: DateTime<Utc>,
    /// Exclusive upper bound.
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Resolves a period query.
    ///
    /// A complete `from`/`to` pair wins over `month`/`year`.
    ///
    /// # Errors
    ///
    /// Returns a validation error when no complete pair is present, the
    /// month is out of range, a date does not exist or `to` precedes `from`.
    pub fn resolve(query: &PeriodQuery, tz: Tz) -> Result<Self, AnalyticsError> {
        match (query.from, query.to, query.month, query.year) {
            (Some(from), Some(to), _, _) => Self::for_days(from, to, tz),
            (_, _, Some(month), Some(year)) => Self::for_month(year, month, tz),
            _ => Err(AnalyticsError::MissingPeriod),
        }
    }

    /// The calendar month `year-month`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMonth` outside 1 through 12, `InvalidDate` when the
    /// year is out of the calendar's range.
    pub fn for_month(year: i32, month: u32, tz: Tz) -> Result<Self, AnalyticsError> {
        if !(1..=12).contains(&month) {
            return Err(AnalyticsError::InvalidMonth(month));
        }
        let (next_year, next_month) = if month == 12 {
            let next_year = year
                .checked_add(1)
                .ok_or_else(|| AnalyticsError::InvalidDate(format!("year after {year}")))?;
            (next_year, 1)
        } else {
            (year, month + 1)
        };

        let first = day(year, month)?;
        let next = day(next_year, next_month)?;

        Ok(Self {
            start: local_midnight(first, tz),
            end: local_midnight(next, tz),
        })
    }

    /// The days `from` through `to`, both included.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDateRange` when `to` is before `from`.
    pub fn for_days(from: NaiveDate, to: NaiveDate, tz: Tz) -> Result<Self, AnalyticsError> {
        if to < from {
            return Err(AnalyticsError::InvalidDateRange { from, to });
        }
        let after = to
            .succ_opt()
            .ok_or_else(|| AnalyticsError::InvalidDate(format!("day after {to}")))?;

        Ok(Self {
            start: local_midnight(from, tz),
            end: local_midnight(after, tz),
        })
    }

    /// Returns true if `at` lies inside the interval.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

fn day(year: i32, month: u32) -> Result<NaiveDate, AnalyticsError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AnalyticsError::InvalidDate(format!("{year}-{month:02}-01")))
}

/// Start of `date` in `tz`, as UTC.
///
/// When a DST jump skips midnight the day starts at the first instant that
/// exists; an ambiguous midnight resolves to the earlier instant.
fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(at) | LocalResult::Ambiguous(at, _) => at.with_timezone(&Utc),
        LocalResult::None => skipped_midnight(midnight, tz),
    }
}

fn skipped_midnight(midnight: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    tz.from_local_datetime(&(midnight + TimeDelta::hours(1)))
        .earliest()
        .map_or_else(|| midnight.and_utc(), |at| at.with_timezone(&Utc))
}
