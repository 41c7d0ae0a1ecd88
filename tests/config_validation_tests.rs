//! Config Validation Tests
//!
//! Typo detection, range warnings and the hard validation rules, exercised
//! through the public config API without touching the pipeline.

use pm_flex::config::validation::{
    known_config_keys, suggest_correction, validate_ranges, validate_unknown_keys,
};
use pm_flex::config::{ConfigError, PmFlexConfig};

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_threshold_key_warns_with_suggestion() {
    let toml_str = r#"
[chronic_tools.chronic_tool_threshold]
unscheduled_pm_rat = 0.3
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("unscheduled_pm_rat"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("chronic_tools.chronic_tool_threshold.unscheduled_pm_rate")
    );
}

#[test]
fn typo_in_section_name_warns_for_section_and_children() {
    let toml_str = r#"
[pm_timng]
early_threshold = -15.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 2);
    assert_eq!(warnings[0].field, "pm_timng");
    assert_eq!(warnings[0].suggestion.as_deref(), Some("pm_timing"));
}

#[test]
fn full_config_produces_zero_warnings() {
    let toml_str = r#"
[pm_timing]
early_threshold = -15.0
on_time_min = -15.0
on_time_max = 15.0
late_threshold = 15.0
overdue_threshold = 30.0

[chronic_tools.chronic_tool_threshold]
unscheduled_pm_rate = 0.30
pm_life_variance = 0.40
min_pm_events = 5

[chronic_tools.score_weights]
unscheduled_pm_rate = 0.35
pm_life_variance = 0.25
downtime_hours = 0.20
reclean_rate = 0.10
sympathy_pm_rate = 0.10

[chronic_tools.severity_thresholds]
low = 25.0
medium = 50.0
high = 75.0
critical = 90.0

[storage]
data_dir = "./data/pm_flex"

[calendar]
years_before = 2
num_years = 5

[data_quality]
max_null_pct = 5.0
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());
    let config = PmFlexConfig::from_toml_str(toml_str).unwrap();
    assert!(validate_ranges(&config).is_empty());
}

#[test]
fn garbage_key_has_no_suggestion() {
    let known = known_config_keys();
    assert!(suggest_correction("zzzzzzzzzzzzzzzz", &known).is_none());
}

#[test]
fn malformed_toml_is_left_to_the_typed_parse() {
    let toml_str = "[pm_timing\nearly_threshold = ";
    assert!(validate_unknown_keys(toml_str).is_empty());
    assert!(matches!(
        PmFlexConfig::from_toml_str(toml_str),
        Err(ConfigError::Parse(..))
    ));
}

// ============================================================================
// Hard Validation Rules
// ============================================================================

#[test]
fn empty_document_is_the_default_config() {
    let config = PmFlexConfig::from_toml_str("").unwrap();
    assert_eq!(config.pm_timing.overdue_threshold, 30.0);
    assert_eq!(config.chronic_tools.chronic_tool_threshold.min_pm_events, 5);
    assert!((config.chronic_tools.score_weights.total() - 1.0).abs() < 1e-9);
}

#[test]
fn weights_not_summing_to_one_rejected() {
    let toml_str = r#"
[chronic_tools.score_weights]
unscheduled_pm_rate = 0.9
"#;
    let Err(ConfigError::Validation(errors)) = PmFlexConfig::from_toml_str(toml_str) else {
        panic!("expected a validation error");
    };
    assert!(errors.iter().any(|e| e.contains("sum to 1.0")), "{errors:?}");
}

#[test]
fn every_violation_is_reported_at_once() {
    let toml_str = r#"
[pm_timing]
late_threshold = 40.0

[chronic_tools.chronic_tool_threshold]
min_pm_events = 0

[chronic_tools.severity_thresholds]
low = 60.0

[calendar]
num_years = 0
"#;
    let Err(ConfigError::Validation(errors)) = PmFlexConfig::from_toml_str(toml_str) else {
        panic!("expected a validation error");
    };
    assert_eq!(errors.len(), 4, "{errors:?}");
    assert!(errors.iter().any(|e| e.contains("late_threshold")));
    assert!(errors.iter().any(|e| e.contains("min_pm_events")));
    assert!(errors.iter().any(|e| e.contains("severity_thresholds")));
    assert!(errors.iter().any(|e| e.contains("num_years")));
}

#[test]
fn nan_threshold_rejected() {
    let toml_str = r#"
[chronic_tools.chronic_tool_threshold]
pm_life_variance = nan
"#;
    let Err(ConfigError::Validation(errors)) = PmFlexConfig::from_toml_str(toml_str) else {
        panic!("expected a validation error");
    };
    assert!(errors.iter().any(|e| e.contains("finite")), "{errors:?}");
}

// ============================================================================
// Range Warnings
// ============================================================================

#[test]
fn loose_chronic_thresholds_warn_but_validate() {
    let toml_str = r#"
[chronic_tools.chronic_tool_threshold]
unscheduled_pm_rate = 0.1
pm_life_variance = 0.1
min_pm_events = 2
"#;
    let config = PmFlexConfig::from_toml_str(toml_str).unwrap();
    let warnings = validate_ranges(&config);
    assert_eq!(warnings.len(), 3, "{warnings:?}");
    assert!(warnings.iter().all(|w| w.field.starts_with("chronic_tools.chronic_tool_threshold")));
}

#[test]
fn timing_band_gap_warns() {
    let toml_str = r#"
[pm_timing]
early_threshold = -20.0
"#;
    let config = PmFlexConfig::from_toml_str(toml_str).unwrap();
    let warnings = validate_ranges(&config);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, "pm_timing.on_time_min");
}

#[test]
fn config_file_roundtrips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pm_flex.toml");
    let mut config = PmFlexConfig::default();
    config.data_quality.max_null_pct = 12.5;
    std::fs::write(&path, config.to_toml().unwrap()).unwrap();

    let loaded = PmFlexConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded.data_quality.max_null_pct, 12.5);

    let missing = dir.path().join("absent.toml");
    assert!(matches!(
        PmFlexConfig::load_from_file(&missing),
        Err(ConfigError::Io(..))
    ));
}
