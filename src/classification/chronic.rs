//! Chronic tool scoring.
//!
//! Converts an `EntityAggregate` into a bounded composite score, a chronic
//! flag and a severity tier.
//!
//! # Scoring Algorithm
//!
//! Five factors, each normalized to 0-100:
//! - unscheduled rate relative to its chronic threshold
//! - PM-life coefficient of variation relative to its chronic threshold
//! - downtime per PM relative to a 10 hour reference
//! - reclean rate
//! - sympathy PM rate
//!
//! The composite is the weighted sum, clipped to 0-100 and rounded to two
//! decimals. The chronic flag is driven by the raw thresholds, not the score;
//! the score only picks the severity tier.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::info;

use crate::config::defaults::{DOWNTIME_REFERENCE_HOURS, MAX_SCORE};
use crate::config::{ChronicThresholds, ChronicToolsConfig, ScoreWeights, SeverityThresholds};
use crate::types::{ChronicScoreRecord, EntityAggregate, Severity};

/// Normalized scoring factors for one entity, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChronicFactors {
    pub unscheduled: f64,
    pub variance: f64,
    pub downtime: f64,
    pub reclean: f64,
    pub sympathy: f64,
}

/// Time span covered by the scored batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl AnalysisWindow {
    /// Whole weeks elapsed between start and end.
    pub fn weeks_analyzed(&self) -> Option<u32> {
        let days = (self.end? - self.start?).num_days();
        u32::try_from(days / 7).ok()
    }
}

fn clip_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, MAX_SCORE)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Normalize the raw metrics of an aggregate.
pub fn normalize_factors(agg: &EntityAggregate, thresholds: &ChronicThresholds) -> ChronicFactors {
    ChronicFactors {
        unscheduled: clip_score(agg.unscheduled_pm_rate / thresholds.unscheduled_pm_rate * 100.0),
        variance: clip_score(agg.pm_life_variance / thresholds.pm_life_variance * 100.0),
        downtime: clip_score(agg.avg_downtime_hours_per_pm / DOWNTIME_REFERENCE_HOURS * 100.0),
        reclean: clip_score(agg.reclean_rate * 100.0),
        sympathy: clip_score(agg.sympathy_pm_rate * 100.0),
    }
}

/// Weighted composite score in `[0, 100]`, rounded to two decimals.
pub fn composite_score(factors: &ChronicFactors, weights: &ScoreWeights) -> f64 {
    let raw = factors.unscheduled * weights.unscheduled_pm_rate
        + factors.variance * weights.pm_life_variance
        + factors.downtime * weights.downtime_hours
        + factors.reclean * weights.reclean_rate
        + factors.sympathy * weights.sympathy_pm_rate;
    round2(clip_score(raw))
}

/// Chronic if the tool has enough events and exceeds either raw threshold.
pub fn is_chronic(agg: &EntityAggregate, thresholds: &ChronicThresholds) -> bool {
    agg.total_pm_events >= thresholds.min_pm_events
        && (agg.unscheduled_pm_rate > thresholds.unscheduled_pm_rate
            || agg.pm_life_variance > thresholds.pm_life_variance)
}

/// Severity tier for a chronic tool's score.
pub fn severity_for(score: f64, tiers: &SeverityThresholds) -> Severity {
    if score >= tiers.critical {
        Severity::Critical
    } else if score >= tiers.high {
        Severity::High
    } else if score >= tiers.medium {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Scores entity aggregates with a fixed configuration.
pub struct ChronicScorer<'a> {
    config: &'a ChronicToolsConfig,
}

impl<'a> ChronicScorer<'a> {
    pub const fn new(config: &'a ChronicToolsConfig) -> Self {
        Self { config }
    }

    /// Score, flag and severity for a single aggregate.
    pub fn score(&self, agg: &EntityAggregate) -> (f64, bool, Option<Severity>) {
        let factors = normalize_factors(agg, &self.config.chronic_tool_threshold);
        let score = composite_score(&factors, &self.config.score_weights);
        let chronic = is_chronic(agg, &self.config.chronic_tool_threshold);
        let severity = chronic.then(|| severity_for(score, &self.config.severity_thresholds));
        (score, chronic, severity)
    }

    /// Score every aggregate and tag the records with the batch window and run.
    pub fn score_all(
        &self,
        aggregates: Vec<EntityAggregate>,
        window: AnalysisWindow,
        calculated_at: NaiveDateTime,
        run_id: &str,
    ) -> Vec<ChronicScoreRecord> {
        let weeks_analyzed = window.weeks_analyzed();
        let records: Vec<ChronicScoreRecord> = aggregates
            .into_iter()
            .map(|aggregate| {
                let (chronic_score, chronic_flag, chronic_severity) = self.score(&aggregate);
                ChronicScoreRecord {
                    aggregate,
                    chronic_score,
                    chronic_flag,
                    chronic_severity,
                    analysis_start_date: window.start,
                    analysis_end_date: window.end,
                    weeks_analyzed,
                    calculation_timestamp: calculated_at,
                    etl_run_id: run_id.to_string(),
                }
            })
            .collect();

        log_chronic_summary(&records);
        records
    }
}

fn log_chronic_summary(records: &[ChronicScoreRecord]) {
    if records.is_empty() {
        return;
    }
    let chronic = records.iter().filter(|r| r.chronic_flag).count();
    #[allow(clippy::cast_precision_loss)]
    let pct = chronic as f64 / records.len() as f64 * 100.0;
    info!(
        tools = records.len(),
        chronic,
        "Chronic tools identified: {chronic}/{} ({pct:.1}%)",
        records.len()
    );

    let mut by_severity: BTreeMap<Severity, usize> = BTreeMap::new();
    for severity in records.iter().filter_map(|r| r.chronic_severity) {
        *by_severity.entry(severity).or_default() += 1;
    }
    if !by_severity.is_empty() {
        info!("Severity distribution: {:?}", by_severity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(total: u32, unscheduled: u32, variance: f64) -> EntityAggregate {
        EntityAggregate {
            entity: "TOOL01".into(),
            facility: "F32".into(),
            ceid: "ETCH".into(),
            total_pm_events: total,
            unscheduled_pm_count: unscheduled,
            unscheduled_pm_rate: f64::from(unscheduled) / f64::from(total.max(1)),
            total_downtime_hours: 0.0,
            avg_downtime_hours_per_pm: 0.0,
            avg_pm_life: Some(1000.0),
            pm_life_std_dev: Some(1000.0 * variance),
            pm_life_variance: variance,
            reclean_rate: 0.0,
            sympathy_pm_rate: 0.0,
        }
    }

    #[test]
    fn test_factors_clip_at_100() {
        let mut agg = aggregate(10, 9, 5.0);
        agg.avg_downtime_hours_per_pm = 50.0;
        agg.reclean_rate = 3.0;
        let f = normalize_factors(&agg, &ChronicThresholds::default());
        assert_eq!(f.unscheduled, 100.0);
        assert_eq!(f.variance, 100.0);
        assert_eq!(f.downtime, 100.0);
        assert_eq!(f.reclean, 100.0);
        assert_eq!(f.sympathy, 0.0);
    }

    #[test]
    fn test_composite_is_weighted_and_rounded() {
        // unscheduled 0.15/0.30 → 50, variance 0.2/0.4 → 50, downtime 2/10 → 20
        let mut agg = aggregate(10, 0, 0.2);
        agg.unscheduled_pm_rate = 0.15;
        agg.avg_downtime_hours_per_pm = 2.0;
        agg.reclean_rate = 0.333;
        let f = normalize_factors(&agg, &ChronicThresholds::default());
        let score = composite_score(&f, &ScoreWeights::default());
        // 50*.35 + 50*.25 + 20*.2 + 33.3*.1 = 17.5 + 12.5 + 4 + 3.33
        assert!((score - 37.33).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn test_composite_bounded_for_extreme_inputs() {
        let weights = ScoreWeights::default();
        for value in [0.0, 1.0, 1e6, f64::INFINITY, f64::NAN] {
            let f = ChronicFactors {
                unscheduled: clip_score(value),
                variance: clip_score(value),
                downtime: clip_score(value),
                reclean: clip_score(value),
                sympathy: clip_score(value),
            };
            let score = composite_score(&f, &weights);
            assert!((0.0..=100.0).contains(&score), "{value} → {score}");
        }
    }

    #[test]
    fn test_never_chronic_below_min_events() {
        let thresholds = ChronicThresholds::default();
        let agg = aggregate(4, 4, 2.0);
        assert!(!is_chronic(&agg, &thresholds));
    }

    #[test]
    fn test_chronic_on_either_threshold() {
        let thresholds = ChronicThresholds::default();
        assert!(is_chronic(&aggregate(5, 2, 0.0), &thresholds));
        assert!(is_chronic(&aggregate(5, 0, 0.5), &thresholds));
        assert!(!is_chronic(&aggregate(10, 3, 0.4), &thresholds), "thresholds are strict");
    }

    #[test]
    fn test_severity_tiers_monotonic() {
        let tiers = SeverityThresholds::default();
        let scores = [0.0, 24.9, 25.0, 49.99, 50.0, 75.0, 89.99, 90.0, 100.0];
        let severities: Vec<_> = scores.iter().map(|s| severity_for(*s, &tiers)).collect();
        assert!(severities.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(severity_for(10.0, &tiers), Severity::Low);
        assert_eq!(severity_for(50.0, &tiers), Severity::Medium);
        assert_eq!(severity_for(75.0, &tiers), Severity::High);
        assert_eq!(severity_for(90.0, &tiers), Severity::Critical);
    }

    #[test]
    fn test_severity_only_when_chronic() {
        let config = ChronicToolsConfig::default();
        let scorer = ChronicScorer::new(&config);

        let (_, chronic, severity) = scorer.score(&aggregate(3, 3, 1.0));
        assert!(!chronic);
        assert!(severity.is_none());

        let (score, chronic, severity) = scorer.score(&aggregate(5, 2, 0.1));
        assert!(chronic);
        assert_eq!(severity, Some(severity_for(score, &config.severity_thresholds)));
    }

    #[test]
    fn test_weeks_analyzed_truncates() {
        let window = AnalysisWindow {
            start: NaiveDate::from_ymd_opt(2025, 1, 1),
            end: NaiveDate::from_ymd_opt(2025, 1, 20),
        };
        assert_eq!(window.weeks_analyzed(), Some(2));
        assert_eq!(AnalysisWindow::default().weeks_analyzed(), None);
    }
}
