//! Raw PM Flex event (bronze layer)

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::defaults::UNKNOWN_POPULATION_FLAG;

fn default_population_flag() -> String {
    UNKNOWN_POPULATION_FLAG.to_string()
}

/// One preventive-maintenance transaction as captured from the PM Flex export.
///
/// Every attribute except the id is nullable; the export routinely has holes.
/// Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmEvent {
    /// Stable event identifier, used for incremental anti-joins.
    pub pm_flex_raw_id: String,

    /// Tool name
    pub entity: Option<String>,
    pub facility: Option<String>,
    pub unique_entity_id: Option<String>,
    /// Chamber / functional area
    pub ceid: Option<String>,
    /// Fiscal work-week string as exported, e.g. `2025WW22`
    pub yearww: Option<String>,
    pub txn_date: Option<NaiveDateTime>,
    pub pm_name: Option<String>,
    /// Part name
    pub attribute_name: Option<String>,

    /// Actual usage (wafers) at replacement
    pub custom_delta: Option<f64>,
    /// Target usage (wafers)
    pub median_delta: Option<f64>,

    pub down_window_duration_hr: Option<f64>,
    pub downtime_type: Option<String>,
    pub downtime_class: Option<String>,
    pub downtime_subclass: Option<String>,
    pub downtime_subclass_details: Option<String>,
    pub pm_reason_deepdive: Option<String>,

    pub reclean_label: Option<bool>,
    pub sympathy_pm: Option<bool>,
    pub duration_outlier: Option<bool>,
    pub pm_cycle_utilization: Option<f64>,

    /// Tool-population flag
    #[serde(default = "default_population_flag")]
    pub altair_flag: String,

    pub source_file: Option<String>,
    pub load_timestamp: Option<NaiveDateTime>,
}

impl PmEvent {
    /// An event with the given id and every attribute null.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            pm_flex_raw_id: id.into(),
            entity: None,
            facility: None,
            unique_entity_id: None,
            ceid: None,
            yearww: None,
            txn_date: None,
            pm_name: None,
            attribute_name: None,
            custom_delta: None,
            median_delta: None,
            down_window_duration_hr: None,
            downtime_type: None,
            downtime_class: None,
            downtime_subclass: None,
            downtime_subclass_details: None,
            pm_reason_deepdive: None,
            reclean_label: None,
            sympathy_pm: None,
            duration_outlier: None,
            pm_cycle_utilization: None,
            altair_flag: default_population_flag(),
            source_file: None,
            load_timestamp: None,
        }
    }

    /// Physical tool identity, if all three parts are present.
    pub fn entity_key(&self) -> Option<EntityKey> {
        Some(EntityKey {
            entity: self.entity.clone()?,
            facility: self.facility.clone()?,
            ceid: self.ceid.clone()?,
        })
    }
}

/// Physical tool identity: (tool, facility, chamber).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub entity: String,
    pub facility: String,
    pub ceid: String,
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.facility, self.ceid, self.entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_population_flag_defaults_to_unknown() {
        let json = serde_json::json!({ "pm_flex_raw_id": "r1" });
        let event: PmEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event.altair_flag, "UNKNOWN");
        assert!(event.entity.is_none());
    }

    #[test]
    fn test_entity_key_requires_all_parts() {
        let mut event = PmEvent::new("r1");
        event.entity = Some("TOOL01".into());
        event.facility = Some("F32".into());
        assert!(event.entity_key().is_none());
        event.ceid = Some("ETCH".into());
        assert_eq!(event.entity_key().unwrap().to_string(), "F32/ETCH/TOOL01");
    }
}
