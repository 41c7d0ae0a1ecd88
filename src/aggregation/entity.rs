//! Per-tool aggregation over classified events.

use std::collections::BTreeMap;

use super::stats;
use crate::types::{ClassifiedEvent, EntityAggregate, EntityKey};

#[derive(Debug, Default)]
struct EntityAccumulator {
    total: u32,
    unscheduled: u32,
    downtime_hours: f64,
    pm_life: Vec<f64>,
    reclean: (u32, u32),
    sympathy: (u32, u32),
}

impl EntityAccumulator {
    fn push(&mut self, e: &ClassifiedEvent) {
        self.total += 1;
        if !e.is_scheduled() {
            self.unscheduled += 1;
        }
        if let Some(h) = e.event.down_window_duration_hr {
            self.downtime_hours += h;
        }
        if let Some(life) = e.event.custom_delta {
            self.pm_life.push(life);
        }
        tally(&mut self.reclean, e.event.reclean_label);
        tally(&mut self.sympathy, e.event.sympathy_pm);
    }

    fn finish(self, key: EntityKey) -> EntityAggregate {
        let avg_pm_life = stats::mean(&self.pm_life);
        let pm_life_std_dev = stats::sample_std_dev(&self.pm_life);
        let pm_life_variance = match (avg_pm_life, pm_life_std_dev) {
            (Some(mean), Some(std)) if mean > 0.0 => std / mean,
            _ => 0.0,
        };

        EntityAggregate {
            entity: key.entity,
            facility: key.facility,
            ceid: key.ceid,
            total_pm_events: self.total,
            unscheduled_pm_count: self.unscheduled,
            unscheduled_pm_rate: stats::rate(self.unscheduled, self.total),
            total_downtime_hours: self.downtime_hours,
            avg_downtime_hours_per_pm: if self.total == 0 {
                0.0
            } else {
                self.downtime_hours / f64::from(self.total)
            },
            avg_pm_life,
            pm_life_std_dev,
            pm_life_variance,
            reclean_rate: stats::rate(self.reclean.0, self.reclean.1),
            sympathy_pm_rate: stats::rate(self.sympathy.0, self.sympathy.1),
        }
    }
}

/// (true count, present count)
fn tally(counter: &mut (u32, u32), value: Option<bool>) {
    if let Some(v) = value {
        counter.1 += 1;
        if v {
            counter.0 += 1;
        }
    }
}

/// Result of grouping events by physical tool.
#[derive(Debug, Default)]
pub struct EntityAggregation {
    /// Sorted by (tool, facility, chamber)
    pub aggregates: Vec<EntityAggregate>,
    /// Events excluded for a missing key component
    pub skipped: usize,
}

/// Group events by (tool, facility, chamber) and compute per-tool metrics.
///
/// Deterministic and independent of input order.
pub fn aggregate_entities(events: &[ClassifiedEvent]) -> EntityAggregation {
    let mut groups: BTreeMap<EntityKey, EntityAccumulator> = BTreeMap::new();
    let mut skipped = 0;

    for e in events {
        match e.event.entity_key() {
            Some(key) => groups.entry(key).or_default().push(e),
            None => skipped += 1,
        }
    }

    EntityAggregation {
        aggregates: groups
            .into_iter()
            .map(|(key, acc)| acc.finish(key))
            .collect(),
        skipped,
    }
}
