//! Weekly summary and KPI fact rows (silver summary + gold layer)

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::Severity;
use crate::calendar::FiscalWeek;

/// Measures shared by every weekly rollup grain.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeeklyMeasures {
    pub total_pm_events: u32,
    pub scheduled_pm_count: u32,
    pub unscheduled_pm_count: u32,

    pub early_pm_count: u32,
    pub on_time_pm_count: u32,
    pub late_pm_count: u32,
    pub overdue_pm_count: u32,

    pub total_downtime_hours: f64,
    /// Mean over events with a recorded duration
    pub avg_downtime_hours: Option<f64>,

    pub avg_pm_life: Option<f64>,
    pub median_pm_life: Option<f64>,
    pub pm_life_std_dev: Option<f64>,
    /// First non-null target in (transaction date, event id) order
    pub target_pm_life: Option<f64>,
    pub avg_pm_life_vs_target: Option<f64>,

    pub unscheduled_pm_rate: f64,
    pub early_pm_rate: f64,
    pub on_time_pm_rate: f64,
    pub overdue_pm_rate: f64,

    /// Total downtime split by the scheduled share of events (approximation)
    pub scheduled_downtime_hours: f64,
    pub unscheduled_downtime_hours: f64,
}

/// Downtime summary per (facility, chamber, week, population flag).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DowntimeSummaryRow {
    pub facility: String,
    pub ceid: String,
    pub ww_year: i32,
    pub ww_number: u32,
    pub yearww: String,
    pub altair_flag: String,

    #[serde(flatten)]
    pub measures: WeeklyMeasures,

    /// `pm_life_std_dev²`
    pub pm_life_variance: Option<f64>,

    pub calculation_timestamp: NaiveDateTime,
    pub etl_run_id: String,
}

/// Site-level KPI fact per (facility, week).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteKpiRow {
    pub facility: String,
    pub ww_year: i32,
    pub ww_number: u32,
    pub yearww: String,

    #[serde(flatten)]
    pub measures: WeeklyMeasures,

    pub total_tools_count: u32,
    pub chronic_tools_count: u32,
    /// Percentage, 0-100
    pub chronic_tools_pct: f64,

    /// Filled by the rolling pass; null until then
    pub rolling_4wk_avg_pm_life: Option<f64>,
    pub rolling_4wk_pm_count: Option<u32>,
    pub rolling_4wk_downtime_hours: Option<f64>,

    pub calculation_timestamp: NaiveDateTime,
    pub etl_run_id: String,
}

impl SiteKpiRow {
    pub const fn fiscal_week(&self) -> FiscalWeek {
        FiscalWeek::new(self.ww_year, self.ww_number)
    }
}

/// Chamber-level KPI fact per (chamber, facility, population flag, week).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CeidKpiRow {
    pub ceid: String,
    pub facility: String,
    pub altair_flag: String,
    pub ww_year: i32,
    pub ww_number: u32,
    pub yearww: String,

    #[serde(flatten)]
    pub measures: WeeklyMeasures,

    pub total_tools_count: u32,
    pub chronic_tools_count: u32,
    pub chronic_tools_pct: f64,

    pub calculation_timestamp: NaiveDateTime,
    pub etl_run_id: String,
}

/// Part replacement summary per (part, tool, facility, chamber, week).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartReplacementRow {
    pub attribute_name: String,
    pub entity: String,
    pub facility: String,
    pub ceid: String,
    pub ww_year: i32,
    pub ww_number: u32,
    pub yearww: String,

    pub replacement_count: u32,
    pub avg_wafers_at_replacement: Option<f64>,
    pub median_wafers_at_replacement: Option<f64>,
    pub min_wafers_at_replacement: Option<f64>,
    pub max_wafers_at_replacement: Option<f64>,
    /// Sample standard deviation of usage at replacement
    pub part_life_std_dev: Option<f64>,
    /// Whole days between the first and last replacement in the group
    pub txn_span_days: Option<i64>,
    pub early_replacement_count: u32,
    /// Late plus overdue
    pub late_replacement_count: u32,

    pub calculation_timestamp: NaiveDateTime,
    pub etl_run_id: String,
}

/// Weekly snapshot of a tool's chronic status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChronicHistoryRow {
    pub entity: String,
    pub facility: String,
    pub ceid: String,
    pub altair_flag: String,
    pub ww_year: i32,
    pub ww_number: u32,
    pub yearww: String,

    pub chronic_flag: bool,
    pub chronic_score: f64,
    pub chronic_severity: Option<Severity>,
    pub unscheduled_pm_count: u32,
    pub unscheduled_pm_rate: f64,
    pub pm_life_variance: f64,
    pub total_downtime_hours: f64,

    /// Score delta against the previous history row for this tool, 0 for the first
    pub chronic_score_change: f64,
    /// Chronic flag differs from the previous history row for this tool
    pub status_changed: bool,

    pub calculation_timestamp: NaiveDateTime,
    pub etl_run_id: String,
}

impl ChronicHistoryRow {
    pub const fn fiscal_week(&self) -> FiscalWeek {
        FiscalWeek::new(self.ww_year, self.ww_number)
    }
}
