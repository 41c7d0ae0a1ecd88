//! Accumulator for the measures shared by every weekly rollup grain.

use chrono::NaiveDateTime;

use super::stats;
use crate::types::{ClassifiedEvent, TimingCategory, WeeklyMeasures};

/// Folds classified events into `WeeklyMeasures`.
#[derive(Debug, Default, Clone)]
pub struct WeeklyAccumulator {
    total: u32,
    scheduled: u32,
    early: u32,
    on_time: u32,
    late: u32,
    overdue: u32,
    downtime: Vec<f64>,
    pm_life: Vec<f64>,
    deviation: Vec<f64>,
    /// Earliest (missing date last, txn date, event id) carrying a target
    first_target: Option<((bool, Option<NaiveDateTime>, String), f64)>,
}

impl WeeklyAccumulator {
    pub fn push(&mut self, e: &ClassifiedEvent) {
        self.total += 1;
        if e.is_scheduled() {
            self.scheduled += 1;
        }
        match e.pm_timing_classification {
            TimingCategory::Early => self.early += 1,
            TimingCategory::OnTime => self.on_time += 1,
            TimingCategory::Late => self.late += 1,
            TimingCategory::Overdue => self.overdue += 1,
            TimingCategory::Unknown => {}
        }
        if let Some(h) = e.event.down_window_duration_hr {
            self.downtime.push(h);
        }
        if let Some(life) = e.event.custom_delta {
            self.pm_life.push(life);
        }
        if let Some(dev) = e.pm_life_vs_target {
            self.deviation.push(dev);
        }
        if let Some(target) = e.event.median_delta {
            let key = (
                e.event.txn_date.is_none(),
                e.event.txn_date,
                e.event.pm_flex_raw_id.clone(),
            );
            let earlier = self.first_target.as_ref().map_or(true, |(k, _)| key < *k);
            if earlier {
                self.first_target = Some((key, target));
            }
        }
    }

    pub const fn total(&self) -> u32 {
        self.total
    }

    pub fn finish(&self) -> WeeklyMeasures {
        let total_downtime_hours: f64 = self.downtime.iter().sum();
        let unscheduled = self.total - self.scheduled;
        let scheduled_share = stats::rate(self.scheduled, self.total);
        let scheduled_downtime_hours = total_downtime_hours * scheduled_share;

        WeeklyMeasures {
            total_pm_events: self.total,
            scheduled_pm_count: self.scheduled,
            unscheduled_pm_count: unscheduled,
            early_pm_count: self.early,
            on_time_pm_count: self.on_time,
            late_pm_count: self.late,
            overdue_pm_count: self.overdue,
            total_downtime_hours,
            avg_downtime_hours: stats::mean(&self.downtime),
            avg_pm_life: stats::mean(&self.pm_life),
            median_pm_life: stats::median(&self.pm_life),
            pm_life_std_dev: stats::sample_std_dev(&self.pm_life),
            target_pm_life: self.first_target.as_ref().map(|(_, t)| *t),
            avg_pm_life_vs_target: stats::mean(&self.deviation),
            unscheduled_pm_rate: stats::rate(unscheduled, self.total),
            early_pm_rate: stats::rate(self.early, self.total),
            on_time_pm_rate: stats::rate(self.on_time, self.total),
            overdue_pm_rate: stats::rate(self.overdue, self.total),
            scheduled_downtime_hours,
            unscheduled_downtime_hours: total_downtime_hours - scheduled_downtime_hours,
        }
    }
}
