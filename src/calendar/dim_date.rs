//! Date dimension rows generated from the fiscal calendar.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{CalendarError, FiscalCalendar};

/// One calendar day with its fiscal attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimDateRow {
    /// `YYYYMMDD` as an integer.
    pub date_key: u32,
    pub date_value: NaiveDate,
    /// 1-based day within the fiscal year.
    pub day_of_year: u32,
    pub fiscal_year: i32,
    pub fiscal_quarter: u32,
    pub fiscal_month: u32,
    pub fiscal_week: u32,
    pub work_week: String,
    /// Monday = 0.
    pub day_of_week: u32,
    pub day_name: String,
    pub is_weekend: bool,
}

impl DimDateRow {
    fn build(
        calendar: &dyn FiscalCalendar,
        date: NaiveDate,
        year_start: NaiveDate,
    ) -> Result<Self, CalendarError> {
        let fiscal = calendar.week_of(date)?;
        let day_of_week = date.weekday().num_days_from_monday();
        let doy = (date - year_start).num_days() + 1;
        Ok(Self {
            date_key: date.year().unsigned_abs() * 10_000 + date.month() * 100 + date.day(),
            date_value: date,
            day_of_year: u32::try_from(doy).map_err(|_| CalendarError::YearOutOfRange(fiscal.year))?,
            fiscal_year: fiscal.year,
            fiscal_quarter: fiscal.quarter(),
            fiscal_month: fiscal.month(),
            fiscal_week: fiscal.week,
            work_week: fiscal.to_string(),
            day_of_week,
            day_name: date.format("%A").to_string(),
            is_weekend: day_of_week >= 5,
        })
    }
}

/// Every day of `num_years` consecutive fiscal years starting at `start_year`.
pub fn generate_dim_date(
    calendar: &dyn FiscalCalendar,
    start_year: i32,
    num_years: u32,
) -> Result<Vec<DimDateRow>, CalendarError> {
    let mut rows = Vec::new();
    for offset in 0..num_years {
        let year = start_year
            .checked_add_unsigned(offset)
            .ok_or(CalendarError::YearOutOfRange(start_year))?;
        let start = calendar.year_start(year)?;
        let end = calendar.year_start(year + 1)?;
        let mut date = start;
        while date < end {
            rows.push(DimDateRow::build(calendar, date, start)?);
            date += Duration::days(1);
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::IntelCalendar;

    #[test]
    fn test_single_year_is_contiguous() {
        let cal = IntelCalendar::new();
        let rows = generate_dim_date(&cal, 2020, 1).unwrap();
        assert_eq!(rows.len(), 364);

        let first = &rows[0];
        assert_eq!(first.date_key, 20_191_229);
        assert_eq!(first.work_week, "2020WW01");
        assert_eq!(first.day_of_year, 1);
        assert_eq!(first.day_name, "Sunday");
        assert_eq!(first.day_of_week, 6);
        assert!(first.is_weekend);

        let last = rows.last().unwrap();
        assert_eq!(last.work_week, "2020WW52");
        assert_eq!(last.day_of_year, 364);
        assert_eq!(last.fiscal_quarter, 4);
    }

    #[test]
    fn test_multi_year_spans_53_week_year() {
        let cal = IntelCalendar::new();
        let rows = generate_dim_date(&cal, 2021, 2).unwrap();
        // FY2021 has 52 weeks, FY2022 has 53
        assert_eq!(rows.len(), 364 + 371);
        assert!(rows.windows(2).all(|w| w[1].date_value - w[0].date_value == Duration::days(1)));
        assert_eq!(rows.iter().filter(|r| r.work_week == "2022WW53").count(), 7);
    }

    #[test]
    fn test_weekday_flags() {
        let cal = IntelCalendar::new();
        let rows = generate_dim_date(&cal, 2024, 1).unwrap();
        let monday = rows.iter().find(|r| r.day_name == "Monday").unwrap();
        assert_eq!(monday.day_of_week, 0);
        assert!(!monday.is_weekend);
        let saturday = rows.iter().find(|r| r.day_name == "Saturday").unwrap();
        assert_eq!(saturday.day_of_week, 5);
        assert!(saturday.is_weekend);
    }
}
