//! Per-tool aggregates and chronic scoring records

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::EntityKey;

/// Statistical profile of one physical tool over the analysis batch.
///
/// Recomputed from scratch on every aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAggregate {
    pub entity: String,
    pub facility: String,
    pub ceid: String,

    pub total_pm_events: u32,
    pub unscheduled_pm_count: u32,
    pub unscheduled_pm_rate: f64,

    pub total_downtime_hours: f64,
    pub avg_downtime_hours_per_pm: f64,

    pub avg_pm_life: Option<f64>,
    /// Sample standard deviation, undefined below two observations
    pub pm_life_std_dev: Option<f64>,
    /// Coefficient of variation of PM life (`std / mean`), 0 when undefined
    pub pm_life_variance: f64,

    pub reclean_rate: f64,
    pub sympathy_pm_rate: f64,
}

impl EntityAggregate {
    pub fn key(&self) -> EntityKey {
        EntityKey {
            entity: self.entity.clone(),
            facility: self.facility.clone(),
            ceid: self.ceid.clone(),
        }
    }
}

/// Severity tier of a chronic tool, ascending.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        };
        f.write_str(s)
    }
}

/// Entity aggregate with its composite score, chronic flag and severity.
///
/// `chronic_severity` is `Some` exactly when `chronic_flag` is true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChronicScoreRecord {
    #[serde(flatten)]
    pub aggregate: EntityAggregate,

    /// Composite score in `[0, 100]`, rounded to two decimals
    pub chronic_score: f64,
    pub chronic_flag: bool,
    pub chronic_severity: Option<Severity>,

    pub analysis_start_date: Option<NaiveDate>,
    pub analysis_end_date: Option<NaiveDate>,
    pub weeks_analyzed: Option<u32>,

    pub calculation_timestamp: NaiveDateTime,
    pub etl_run_id: String,
}
