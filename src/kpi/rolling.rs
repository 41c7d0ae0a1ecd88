//! Trailing-window statistics over the site KPI table.
//!
//! Per facility, rows are ordered by fiscal week and a window of the last
//! `ROLLING_WINDOW_WEEKS` rows yields the mean average PM life, the summed
//! event count and the summed downtime. A statistic is emitted once the
//! window holds `ROLLING_MIN_PERIODS` defined values.

use std::collections::{BTreeMap, VecDeque};

use crate::config::defaults::{ROLLING_MIN_PERIODS, ROLLING_WINDOW_WEEKS};
use crate::types::SiteKpiRow;

/// Bounded trailing window over optional observations.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    len: usize,
    min_periods: usize,
    values: VecDeque<Option<f64>>,
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(ROLLING_WINDOW_WEEKS, ROLLING_MIN_PERIODS)
    }
}

impl RollingWindow {
    pub fn new(len: usize, min_periods: usize) -> Self {
        let len = len.max(1);
        Self {
            len,
            min_periods: min_periods.clamp(1, len),
            values: VecDeque::with_capacity(len),
        }
    }

    pub fn push(&mut self, value: Option<f64>) {
        if self.values.len() == self.len {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    fn defined(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().filter_map(|v| *v).filter(|v| v.is_finite())
    }

    pub fn sum(&self) -> Option<f64> {
        let (count, total) = self.defined().fold((0, 0.0), |(n, s), v| (n + 1, s + v));
        (count >= self.min_periods).then_some(total)
    }

    pub fn mean(&self) -> Option<f64> {
        let (count, total) = self.defined().fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));
        #[allow(clippy::cast_precision_loss)]
        let mean = total / count as f64;
        (count >= self.min_periods).then_some(mean)
    }
}

/// Fill the rolling columns of every row. Rows come back ordered by
/// (facility, fiscal week); rows of the same week keep their stored order.
pub fn apply_rolling(rows: Vec<SiteKpiRow>) -> Vec<SiteKpiRow> {
    let mut by_facility: BTreeMap<String, Vec<SiteKpiRow>> = BTreeMap::new();
    for row in rows {
        by_facility.entry(row.facility.clone()).or_default().push(row);
    }

    let mut out = Vec::new();
    for (_, mut series) in by_facility {
        series.sort_by_key(SiteKpiRow::fiscal_week);

        let mut life = RollingWindow::default();
        let mut count = RollingWindow::default();
        let mut downtime = RollingWindow::default();
        for mut row in series {
            life.push(row.measures.avg_pm_life);
            count.push(Some(f64::from(row.measures.total_pm_events)));
            downtime.push(Some(row.measures.total_downtime_hours));

            row.rolling_4wk_avg_pm_life = life.mean();
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let pm_count = count.sum().map(|c| c.round() as u32);
            row.rolling_4wk_pm_count = pm_count;
            row.rolling_4wk_downtime_hours = downtime.sum();
            out.push(row);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WeeklyMeasures;
    use chrono::NaiveDate;

    fn row(facility: &str, week: u32, life: Option<f64>, events: u32, hours: f64) -> SiteKpiRow {
        SiteKpiRow {
            facility: facility.into(),
            ww_year: 2025,
            ww_number: week,
            yearww: format!("2025WW{week:02}"),
            measures: WeeklyMeasures {
                total_pm_events: events,
                total_downtime_hours: hours,
                avg_pm_life: life,
                ..WeeklyMeasures::default()
            },
            total_tools_count: 1,
            chronic_tools_count: 0,
            chronic_tools_pct: 0.0,
            rolling_4wk_avg_pm_life: None,
            rolling_4wk_pm_count: None,
            rolling_4wk_downtime_hours: None,
            calculation_timestamp: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            etl_run_id: "r".into(),
        }
    }

    #[test]
    fn test_four_period_mean() {
        let rows: Vec<SiteKpiRow> = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0]
            .iter()
            .enumerate()
            .rev()
            .map(|(i, v)| row("F32", u32::try_from(i).unwrap() + 1, Some(*v), 1, 1.0))
            .collect();

        let out = apply_rolling(rows);
        let means: Vec<f64> = out.iter().map(|r| r.rolling_4wk_avg_pm_life.unwrap()).collect();
        assert_eq!(means, vec![10.0, 15.0, 20.0, 25.0, 35.0, 45.0]);
        let counts: Vec<u32> = out.iter().map(|r| r.rolling_4wk_pm_count.unwrap()).collect();
        assert_eq!(counts, vec![1, 2, 3, 4, 4, 4]);
    }

    #[test]
    fn test_facilities_are_independent() {
        let out = apply_rolling(vec![
            row("F32", 2, Some(100.0), 2, 5.0),
            row("D1X", 1, Some(10.0), 1, 1.0),
            row("F32", 1, Some(50.0), 3, 2.0),
        ]);
        assert_eq!(out[0].facility, "D1X");
        assert_eq!(out[0].rolling_4wk_downtime_hours, Some(1.0));
        assert_eq!(out[2].facility, "F32");
        assert_eq!(out[2].ww_number, 2);
        assert_eq!(out[2].rolling_4wk_avg_pm_life, Some(75.0));
        assert_eq!(out[2].rolling_4wk_pm_count, Some(5));
        assert_eq!(out[2].rolling_4wk_downtime_hours, Some(7.0));
    }

    #[test]
    fn test_missing_life_is_skipped_in_mean() {
        let mut window = RollingWindow::default();
        window.push(None);
        assert_eq!(window.mean(), None);
        window.push(Some(8.0));
        window.push(None);
        assert_eq!(window.mean(), Some(8.0));
        assert_eq!(window.sum(), Some(8.0));
    }

    #[test]
    fn test_window_honours_min_periods() {
        let mut window = RollingWindow::new(3, 2);
        window.push(Some(1.0));
        assert_eq!(window.sum(), None);
        window.push(Some(2.0));
        window.push(Some(3.0));
        window.push(Some(4.0));
        assert_eq!(window.sum(), Some(9.0));
        assert_eq!(window.mean(), Some(3.0));
    }
}
