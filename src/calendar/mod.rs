//! Fiscal work-week calendar.
//!
//! Converts calendar dates to fiscal-week identifiers (`2025WW22`) and back.
//! The engine only depends on the [`FiscalCalendar`] trait; [`IntelCalendar`]
//! is the concrete convention used by the fabs:
//!
//! - fiscal year `N` ends on the **last Saturday of December `N`**
//! - fiscal year `N` starts the day after fiscal year `N-1` ends (a Sunday)
//! - weeks are consecutive 7-day blocks from the fiscal-year start, so a year
//!   has 52 or 53 weeks
//!
//! Example: 2019-12-28 is the last Saturday of 2019, so 2019-12-29 is `2020WW01`.

mod dim_date;

pub use dim_date::{generate_dim_date, DimDateRow};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

use crate::config::defaults::{WEEKS_PER_MONTH, WEEKS_PER_QUARTER};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Invalid WW string format: '{0}'")]
    InvalidFormat(String),

    #[error("Week {week} does not exist in fiscal year {year}")]
    WeekOutOfRange { year: i32, week: u32 },

    #[error("Fiscal year {0} is outside the supported date range")]
    YearOutOfRange(i32),

    #[error("Work-week pattern failed to compile: {0}")]
    Pattern(String),
}

// ============================================================================
// FiscalWeek
// ============================================================================

/// A fiscal (year, week) pair. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FiscalWeek {
    pub year: i32,
    pub week: u32,
}

impl FiscalWeek {
    pub const fn new(year: i32, week: u32) -> Self {
        Self { year, week }
    }

    /// Fiscal quarter using the simplified 13-week quarter: `(week-1)/13+1`.
    pub const fn quarter(&self) -> u32 {
        self.week.saturating_sub(1) / WEEKS_PER_QUARTER + 1
    }

    /// Fiscal month using the simplified 4-week month: `(week-1)/4+1`.
    pub const fn month(&self) -> u32 {
        self.week.saturating_sub(1) / WEEKS_PER_MONTH + 1
    }
}

impl fmt::Display for FiscalWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}WW{:02}", self.year, self.week)
    }
}

fn week_pattern() -> Result<&'static Regex, CalendarError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d{4})WW(\d{2})"))
        .as_ref()
        .map_err(|e| CalendarError::Pattern(e.to_string()))
}

impl FromStr for FiscalWeek {
    type Err = CalendarError;

    /// Parse `<4-digit year>WW<2-digit week>`. Anything after the two week
    /// digits is ignored (`2025WW22nn` parses as `2025WW22`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CalendarError::InvalidFormat(s.to_string());
        let caps = week_pattern()?.captures(s).ok_or_else(invalid)?;
        let year = caps[1].parse::<i32>().map_err(|_| invalid())?;
        let week = caps[2].parse::<u32>().map_err(|_| invalid())?;
        Ok(Self { year, week })
    }
}

// ============================================================================
// Calendar Trait
// ============================================================================

/// Date ⇄ fiscal-week conversion.
pub trait FiscalCalendar: Send + Sync {
    /// First day of the given fiscal year.
    fn year_start(&self, year: i32) -> Result<NaiveDate, CalendarError>;

    /// Fiscal week containing `date`.
    fn week_of(&self, date: NaiveDate) -> Result<FiscalWeek, CalendarError>;

    /// Number of weeks in the given fiscal year.
    fn weeks_in_year(&self, year: i32) -> Result<u32, CalendarError> {
        let start = self.year_start(year)?;
        let next = self.year_start(year + 1)?;
        let weeks = (next - start).num_days() / 7;
        u32::try_from(weeks).map_err(|_| CalendarError::YearOutOfRange(year))
    }

    /// Inclusive first and last day of a fiscal week.
    fn week_range(&self, week: FiscalWeek) -> Result<(NaiveDate, NaiveDate), CalendarError> {
        if week.week == 0 || week.week > self.weeks_in_year(week.year)? {
            return Err(CalendarError::WeekOutOfRange {
                year: week.year,
                week: week.week,
            });
        }
        let start = self.year_start(week.year)? + Duration::weeks(i64::from(week.week - 1));
        Ok((start, start + Duration::days(6)))
    }

    /// Parse a work-week string, rejecting weeks this calendar does not have.
    fn parse_week(&self, s: &str) -> Result<FiscalWeek, CalendarError> {
        let week: FiscalWeek = s.parse()?;
        self.week_range(week)?;
        Ok(week)
    }

    /// The week `offset` weeks away from `week` (negative goes back in time),
    /// crossing fiscal-year boundaries correctly.
    fn offset_week(&self, week: FiscalWeek, offset: i64) -> Result<FiscalWeek, CalendarError> {
        let (start, _) = self.week_range(week)?;
        self.week_of(start + Duration::weeks(offset))
    }
}

// ============================================================================
// Intel Calendar
// ============================================================================

/// Fiscal calendar whose year ends on the last Saturday of December.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntelCalendar;

impl IntelCalendar {
    pub const fn new() -> Self {
        Self
    }

    /// Last Saturday of December of the given calendar year.
    fn year_end(year: i32) -> Result<NaiveDate, CalendarError> {
        let dec31 =
            NaiveDate::from_ymd_opt(year, 12, 31).ok_or(CalendarError::YearOutOfRange(year))?;
        let back = (dec31.weekday().num_days_from_monday() + 7
            - Weekday::Sat.num_days_from_monday())
            % 7;
        Ok(dec31 - Duration::days(i64::from(back)))
    }
}

impl FiscalCalendar for IntelCalendar {
    fn year_start(&self, year: i32) -> Result<NaiveDate, CalendarError> {
        Ok(Self::year_end(year - 1)? + Duration::days(1))
    }

    fn week_of(&self, date: NaiveDate) -> Result<FiscalWeek, CalendarError> {
        let year = if date > Self::year_end(date.year())? {
            date.year() + 1
        } else {
            date.year()
        };
        let day_index = (date - self.year_start(year)?).num_days();
        let week = u32::try_from(day_index / 7 + 1).map_err(|_| CalendarError::YearOutOfRange(year))?;
        Ok(FiscalWeek { year, week })
    }
}

// ============================================================================
// Tests
// ============================================================================
