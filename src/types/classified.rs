//! Classified (enriched) PM event (silver layer)

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::PmEvent;
use crate::calendar::FiscalWeek;

// ============================================================================
// Classifications
// ============================================================================

/// PM timing relative to target usage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum TimingCategory {
    Early,
    #[serde(rename = "On-Time")]
    OnTime,
    Late,
    Overdue,
    #[default]
    Unknown,
}

impl TimingCategory {
    pub const ALL: [Self; 5] = [
        Self::Early,
        Self::OnTime,
        Self::Late,
        Self::Overdue,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Early => "Early",
            Self::OnTime => "On-Time",
            Self::Late => "Late",
            Self::Overdue => "Overdue",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for TimingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduled vs unscheduled downtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ScheduledCategory {
    Scheduled,
    Unscheduled,
    #[default]
    Unknown,
}

impl ScheduledCategory {
    pub const ALL: [Self; 3] = [Self::Scheduled, Self::Unscheduled, Self::Unknown];

    /// 1 only for `Scheduled`. `Unknown` counts as unscheduled downstream.
    pub const fn flag(&self) -> u8 {
        match self {
            Self::Scheduled => 1,
            Self::Unscheduled | Self::Unknown => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "Scheduled",
            Self::Unscheduled => "Unscheduled",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ScheduledCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Classified Event
// ============================================================================

/// A raw event plus every derived field. Append-only, tagged with its run id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    #[serde(flatten)]
    pub event: PmEvent,

    pub ww_year: Option<i32>,
    pub ww_number: Option<u32>,
    pub fiscal_quarter: Option<u32>,
    pub fiscal_month: Option<u32>,

    /// `custom_delta - median_delta`
    pub pm_life_vs_target: Option<f64>,
    /// `pm_life_vs_target / median_delta * 100`, only when the target is positive
    pub pm_life_vs_target_pct: Option<f64>,
    pub pm_timing_classification: TimingCategory,

    pub scheduled_flag: u8,
    pub scheduled_category: ScheduledCategory,

    pub pm_cycle_efficiency: Option<f64>,
    pub pm_duration_outlier_flag: u8,
    pub reclean_event_flag: u8,
    pub sympathy_pm_flag: u8,

    /// `"<type> - <class>"` with `Unknown` standing in for nulls
    pub downtime_category: String,
    pub downtime_primary_reason: Option<String>,

    /// Share of critical fields present, 0-100
    pub data_quality_score: f64,

    pub enrichment_timestamp: NaiveDateTime,
    pub etl_run_id: String,
}

impl ClassifiedEvent {
    /// Parsed fiscal week, if the raw week string was valid.
    pub fn fiscal_week(&self) -> Option<FiscalWeek> {
        Some(FiscalWeek::new(self.ww_year?, self.ww_number?))
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled_flag == 1
    }
}
