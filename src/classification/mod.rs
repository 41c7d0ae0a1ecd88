//! Business-rule classification
//!
//! - `timing`: per-event PM timing and scheduled/unscheduled status
//! - `chronic`: per-tool composite score, chronic flag and severity tier

pub mod chronic;
pub mod timing;

pub use chronic::{AnalysisWindow, ChronicScorer};
pub use timing::{classify_scheduled, classify_timing, pm_life_deviation, pm_life_deviation_pct};

use std::collections::BTreeMap;
use tracing::info;

use crate::types::{ClassifiedEvent, ScheduledCategory, TimingCategory};

/// Count of events per timing and scheduled category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryDistribution {
    pub timing: BTreeMap<TimingCategory, usize>,
    pub scheduled: BTreeMap<ScheduledCategory, usize>,
}

impl CategoryDistribution {
    pub fn from_events(events: &[ClassifiedEvent]) -> Self {
        let mut dist = Self::default();
        for e in events {
            *dist.timing.entry(e.pm_timing_classification).or_default() += 1;
            *dist.scheduled.entry(e.scheduled_category).or_default() += 1;
        }
        dist
    }

    pub fn timing_count(&self, category: TimingCategory) -> usize {
        self.timing.get(&category).copied().unwrap_or(0)
    }

    pub fn scheduled_count(&self, category: ScheduledCategory) -> usize {
        self.scheduled.get(&category).copied().unwrap_or(0)
    }

    /// Log both distributions at info level.
    pub fn log(&self) {
        let timing: Vec<String> = TimingCategory::ALL
            .iter()
            .map(|c| format!("{c}={}", self.timing_count(*c)))
            .collect();
        let scheduled: Vec<String> = ScheduledCategory::ALL
            .iter()
            .map(|c| format!("{c}={}", self.scheduled_count(*c)))
            .collect();
        info!("PM timing distribution: {}", timing.join(", "));
        info!("Scheduled distribution: {}", scheduled.join(", "));
    }
}
