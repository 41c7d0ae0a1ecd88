//! Config validation: unknown-key detection with Levenshtein suggestions
//! and suspicious-range warnings.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use super::PmFlexConfig;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `PmFlexConfig`.
///
/// Maintained by hand to match the struct hierarchy in pm_config.rs.
/// Any new field added there must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [pm_timing]
        "pm_timing",
        "pm_timing.early_threshold",
        "pm_timing.on_time_min",
        "pm_timing.on_time_max",
        "pm_timing.late_threshold",
        "pm_timing.overdue_threshold",
        // [chronic_tools]
        "chronic_tools",
        // [chronic_tools.chronic_tool_threshold]
        "chronic_tools.chronic_tool_threshold",
        "chronic_tools.chronic_tool_threshold.unscheduled_pm_rate",
        "chronic_tools.chronic_tool_threshold.pm_life_variance",
        "chronic_tools.chronic_tool_threshold.min_pm_events",
        // [chronic_tools.score_weights]
        "chronic_tools.score_weights",
        "chronic_tools.score_weights.unscheduled_pm_rate",
        "chronic_tools.score_weights.pm_life_variance",
        "chronic_tools.score_weights.downtime_hours",
        "chronic_tools.score_weights.reclean_rate",
        "chronic_tools.score_weights.sympathy_pm_rate",
        // [chronic_tools.severity_thresholds]
        "chronic_tools.severity_thresholds",
        "chronic_tools.severity_thresholds.low",
        "chronic_tools.severity_thresholds.medium",
        "chronic_tools.severity_thresholds.high",
        "chronic_tools.severity_thresholds.critical",
        // [storage]
        "storage",
        "storage.data_dir",
        // [calendar]
        "calendar",
        "calendar.years_before",
        "calendar.num_years",
        // [data_quality]
        "data_quality",
        "data_quality.max_null_pct",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties resolve to the lexicographically smallest key so output is stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (levenshtein(unknown, k), k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new(); // parse errors are reported by serde later
    };

    let known = known_config_keys();
    let mut warnings = Vec::new();

    for key in walk_toml_keys(&value, "") {
        if !known.contains(key.as_str()) {
            let suggestion = suggest_correction(&key, &known);
            warnings.push(ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            });
        }
    }

    warnings
}

// ============================================================================
// Suspicious Range Warnings
// ============================================================================

/// Warn about values that are legal but unusual for a PM population.
///
/// Hard errors live in `PmFlexConfig::validate`; this only flags values an
/// operator probably did not intend.
pub fn validate_ranges(config: &PmFlexConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut warn = |field: &str, message: String| {
        warnings.push(ValidationWarning {
            field: field.to_string(),
            message,
            suggestion: None,
        });
    };

    let th = &config.chronic_tools.chronic_tool_threshold;
    if th.unscheduled_pm_rate > 0.5 {
        warn(
            "chronic_tools.chronic_tool_threshold.unscheduled_pm_rate",
            format!(
                "unscheduled_pm_rate = {:.2} is high (>50%), few tools will be flagged chronic",
                th.unscheduled_pm_rate
            ),
        );
    } else if th.unscheduled_pm_rate < 0.2 {
        warn(
            "chronic_tools.chronic_tool_threshold.unscheduled_pm_rate",
            format!(
                "unscheduled_pm_rate = {:.2} is low (<20%), many tools may be flagged chronic",
                th.unscheduled_pm_rate
            ),
        );
    }

    if th.pm_life_variance > 1.0 {
        warn(
            "chronic_tools.chronic_tool_threshold.pm_life_variance",
            format!(
                "pm_life_variance = {:.2} is high (>1.0), few tools will be flagged chronic",
                th.pm_life_variance
            ),
        );
    } else if th.pm_life_variance < 0.2 {
        warn(
            "chronic_tools.chronic_tool_threshold.pm_life_variance",
            format!(
                "pm_life_variance = {:.2} is low (<0.2), many tools may be flagged chronic",
                th.pm_life_variance
            ),
        );
    }

    if th.min_pm_events > 0 && th.min_pm_events < 3 {
        warn(
            "chronic_tools.chronic_tool_threshold.min_pm_events",
            format!(
                "min_pm_events = {} is low, rates over so few events are unreliable",
                th.min_pm_events
            ),
        );
    } else if th.min_pm_events > 20 {
        warn(
            "chronic_tools.chronic_tool_threshold.min_pm_events",
            format!(
                "min_pm_events = {} is high, low-volume tools will never be flagged",
                th.min_pm_events
            ),
        );
    }

    let t = &config.pm_timing;
    if (t.early_threshold - t.on_time_min).abs() > f64::EPSILON {
        warn(
            "pm_timing.on_time_min",
            format!(
                "early_threshold ({}) != on_time_min ({}), the gap classifies as On-Time",
                t.early_threshold, t.on_time_min
            ),
        );
    }
    if (t.on_time_max - t.late_threshold).abs() > f64::EPSILON {
        warn(
            "pm_timing.late_threshold",
            format!(
                "on_time_max ({}) != late_threshold ({}), the gap classifies as On-Time",
                t.on_time_max, t.late_threshold
            ),
        );
    }

    warnings
}

// ============================================================================
// Tests
// ============================================================================
