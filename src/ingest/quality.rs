//! Null-share profiling of raw events.
//!
//! Used twice: on load for the critical key columns and during enrichment
//! for the non-critical columns. Neither pass rejects rows.

use tracing::{info, warn};

use crate::types::PmEvent;

/// A column and how to tell whether an event carries a value for it.
#[derive(Clone, Copy)]
pub struct FieldCheck {
    pub name: &'static str,
    pub present: fn(&PmEvent) -> bool,
}

impl std::fmt::Debug for FieldCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Columns without which a row cannot be grouped.
pub fn critical_fields() -> Vec<FieldCheck> {
    vec![
        FieldCheck { name: "ENTITY", present: |e| e.entity.is_some() },
        FieldCheck { name: "FACILITY", present: |e| e.facility.is_some() },
        FieldCheck { name: "CEID", present: |e| e.ceid.is_some() },
        FieldCheck { name: "YEARWW", present: |e| e.yearww.is_some() },
    ]
}

/// Columns that feed rollups but whose absence only weakens them.
pub fn tracked_fields() -> Vec<FieldCheck> {
    vec![
        FieldCheck { name: "UNIQUE_ENTITY_ID", present: |e| e.unique_entity_id.is_some() },
        FieldCheck { name: "PM_NAME", present: |e| e.pm_name.is_some() },
        FieldCheck { name: "ATTRIBUTE_NAME", present: |e| e.attribute_name.is_some() },
        FieldCheck { name: "DOWN_WINDOW_DURATION_HR", present: |e| e.down_window_duration_hr.is_some() },
        FieldCheck { name: "DOWNTIME_CLASS", present: |e| e.downtime_class.is_some() },
        FieldCheck { name: "DOWNTIME_SUBCLASS", present: |e| e.downtime_subclass.is_some() },
        FieldCheck { name: "Reclean_Label", present: |e| e.reclean_label.is_some() },
        FieldCheck { name: "Sympathy_PM", present: |e| e.sympathy_pm.is_some() },
        FieldCheck {
            name: "DOWN_WINDOW_DURATION_OUTLIER_LABEL_FOR_PMCYCLE",
            present: |e| e.duration_outlier.is_some(),
        },
        FieldCheck { name: "pm_cycle_utilization", present: |e| e.pm_cycle_utilization.is_some() },
    ]
}

/// Null percentage (0-100) per checked column.
#[derive(Debug, Clone, PartialEq)]
pub struct NullReport {
    pub rows: usize,
    pub columns: Vec<(&'static str, f64)>,
}

impl NullReport {
    pub fn profile(events: &[PmEvent], checks: &[FieldCheck]) -> Self {
        let columns = checks
            .iter()
            .map(|check| {
                let nulls = events.iter().filter(|e| !(check.present)(e)).count();
                (check.name, pct(nulls, events.len()))
            })
            .collect();
        Self { rows: events.len(), columns }
    }

    /// Mean null percentage across the checked columns.
    pub fn overall_pct(&self) -> f64 {
        if self.columns.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.columns.len() as f64;
        self.columns.iter().map(|(_, p)| p).sum::<f64>() / n
    }

    pub fn exceeding(&self, max_null_pct: f64) -> Vec<(&'static str, f64)> {
        self.columns
            .iter()
            .filter(|(_, p)| *p > max_null_pct)
            .copied()
            .collect()
    }

    /// Warn for each column over the limit; returns how many were.
    pub fn warn_exceeding(&self, max_null_pct: f64, stage: &str) -> usize {
        let over = self.exceeding(max_null_pct);
        for (column, null_pct) in &over {
            warn!(
                stage,
                column,
                null_pct = format!("{null_pct:.1}"),
                "Column has {null_pct:.1}% nulls (limit {max_null_pct:.0}%)"
            );
        }
        info!(
            stage,
            rows = self.rows,
            "Overall null share across {} checked columns: {:.2}%",
            self.columns.len(),
            self.overall_pct()
        );
        over.len()
    }
}

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let p = part as f64 / whole as f64 * 100.0;
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_critical_columns() {
        let mut full = PmEvent::new("1");
        full.entity = Some("T1".into());
        full.facility = Some("F32".into());
        full.ceid = Some("ETCH".into());
        full.yearww = Some("2025WW10".into());
        let mut partial = PmEvent::new("2");
        partial.entity = Some("T2".into());

        let report = NullReport::profile(&[full, partial], &critical_fields());
        assert_eq!(report.rows, 2);
        assert_eq!(report.columns[0], ("ENTITY", 0.0));
        assert_eq!(report.columns[1], ("FACILITY", 50.0));
        assert!((report.overall_pct() - 37.5).abs() < 1e-9);
        assert!(report.exceeding(50.0).is_empty(), "limit is exclusive");
        assert_eq!(report.exceeding(40.0).len(), 3);
    }

    #[test]
    fn test_empty_batch_has_no_nulls() {
        let report = NullReport::profile(&[], &tracked_fields());
        assert!(report.columns.iter().all(|(_, p)| *p == 0.0));
        assert_eq!(report.warn_exceeding(50.0, "test"), 0);
    }
}
