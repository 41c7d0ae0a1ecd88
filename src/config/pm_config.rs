//! PM Flex Configuration - classification thresholds, chronic scoring weights
//! and severity cutoffs as operator-tunable TOML values.
//!
//! Each struct implements `Default` with the values the pipeline has always
//! shipped with, so a missing config file changes nothing.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults::{
    DIM_DATE_NUM_YEARS, DIM_DATE_YEARS_BEFORE, MAX_NULL_PCT, MAX_SCORE, WEIGHT_SUM_TOLERANCE,
};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "PM_FLEX_CONFIG";

/// Config file looked up in the working directory when the env var is unset.
pub const LOCAL_CONFIG_FILE: &str = "pm_flex.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a PM Flex deployment.
///
/// Load with `PmFlexConfig::load()` which searches:
/// 1. `$PM_FLEX_CONFIG` env var
/// 2. `./pm_flex.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PmFlexConfig {
    /// PM timing classification thresholds (percent deviation from target)
    #[serde(default)]
    pub pm_timing: PmTimingConfig,

    /// Chronic tool detection and scoring
    #[serde(default)]
    pub chronic_tools: ChronicToolsConfig,

    /// Table store location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Date dimension generation
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// Non-fatal data quality reporting
    #[serde(default)]
    pub data_quality: DataQualityConfig,
}

impl PmFlexConfig {
    /// Load configuration using the standard search order:
    /// 1. `$PM_FLEX_CONFIG` environment variable
    /// 2. `./pm_flex.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// A file that exists but fails to parse or validate is an error: thresholds
    /// must never silently fall back once an operator has written them down.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if !p.exists() {
                return Err(ConfigError::Missing(p));
            }
            let config = Self::load_from_file(&p)?;
            info!(path = %p.display(), "Loaded PM Flex config from {CONFIG_ENV_VAR}");
            return Ok(config);
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!("Loaded PM Flex config from ./{LOCAL_CONFIG_FILE}");
            return Ok(config);
        }

        info!("No {LOCAL_CONFIG_FILE} found, using built-in defaults");
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Two-pass: unknown keys are reported as warnings first, then the typed
    /// parse runs and every range rule is checked.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate all thresholds for internal consistency.
    ///
    /// Rules:
    /// - Timing thresholds ordered `early <= on_time_min <= on_time_max <= late <= overdue`
    /// - Chronic thresholds positive, rate in (0, 1], variance in (0, 2], min events >= 1
    /// - Score weights non-negative and summing to 1.0
    /// - Severity cutoffs strictly increasing within (0, 100]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let t = &self.pm_timing;
        let timing = [
            ("early_threshold", t.early_threshold),
            ("on_time_min", t.on_time_min),
            ("on_time_max", t.on_time_max),
            ("late_threshold", t.late_threshold),
            ("overdue_threshold", t.overdue_threshold),
        ];
        if Self::check_finite("pm_timing", &timing, &mut errors) {
            for pair in timing.windows(2) {
                let ((lo_name, lo), (hi_name, hi)) = (pair[0], pair[1]);
                if lo > hi {
                    errors.push(format!(
                        "pm_timing.{lo_name} ({lo}) must be <= pm_timing.{hi_name} ({hi})"
                    ));
                }
            }
        }

        let th = &self.chronic_tools.chronic_tool_threshold;
        if Self::check_finite(
            "chronic_tools.chronic_tool_threshold",
            &[
                ("unscheduled_pm_rate", th.unscheduled_pm_rate),
                ("pm_life_variance", th.pm_life_variance),
            ],
            &mut errors,
        ) {
            // Both thresholds are used as divisors by the scorer
            if th.unscheduled_pm_rate <= 0.0 || th.unscheduled_pm_rate > 1.0 {
                errors.push(format!(
                    "chronic_tool_threshold.unscheduled_pm_rate must be in (0, 1], got {}",
                    th.unscheduled_pm_rate
                ));
            }
            if th.pm_life_variance <= 0.0 || th.pm_life_variance > 2.0 {
                errors.push(format!(
                    "chronic_tool_threshold.pm_life_variance must be in (0, 2], got {}",
                    th.pm_life_variance
                ));
            }
        }
        if th.min_pm_events == 0 {
            errors.push("chronic_tool_threshold.min_pm_events must be >= 1".to_string());
        }

        let w = &self.chronic_tools.score_weights;
        let weights = [
            ("unscheduled_pm_rate", w.unscheduled_pm_rate),
            ("pm_life_variance", w.pm_life_variance),
            ("downtime_hours", w.downtime_hours),
            ("reclean_rate", w.reclean_rate),
            ("sympathy_pm_rate", w.sympathy_pm_rate),
        ];
        if Self::check_finite("chronic_tools.score_weights", &weights, &mut errors) {
            for (name, value) in weights {
                if value < 0.0 {
                    errors.push(format!("score_weights.{name} must be >= 0, got {value}"));
                }
            }
            let total = w.total();
            if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                errors.push(format!("score_weights must sum to 1.0, got {total:.3}"));
            }
        }

        let s = &self.chronic_tools.severity_thresholds;
        let cutoffs = [
            ("low", s.low),
            ("medium", s.medium),
            ("high", s.high),
            ("critical", s.critical),
        ];
        if Self::check_finite("chronic_tools.severity_thresholds", &cutoffs, &mut errors) {
            let ordered = s.low > 0.0
                && s.low < s.medium
                && s.medium < s.high
                && s.high < s.critical
                && s.critical <= MAX_SCORE;
            if !ordered {
                errors.push(format!(
                    "severity_thresholds must satisfy 0 < low ({}) < medium ({}) < high ({}) < critical ({}) <= 100",
                    s.low, s.medium, s.high, s.critical
                ));
            }
        }

        if self.calendar.num_years == 0 {
            errors.push("calendar.num_years must be > 0".to_string());
        }

        let dq = self.data_quality.max_null_pct;
        if !dq.is_finite() || !(0.0..=100.0).contains(&dq) {
            errors.push(format!("data_quality.max_null_pct must be 0-100, got {dq}"));
        }

        for w in super::validation::validate_ranges(self) {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Push an error for every non-finite value. Returns true when all are finite.
    fn check_finite(section: &str, values: &[(&str, f64)], errors: &mut Vec<String>) -> bool {
        let mut all_finite = true;
        for (name, value) in values {
            // NaN comparisons silently pass the ordering rules, so catch them first
            if !value.is_finite() {
                errors.push(format!("{section}.{name} must be a finite number, got {value}"));
                all_finite = false;
            }
        }
        all_finite
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, std::io::Error),

    #[error("Config file {} named by {CONFIG_ENV_VAR} does not exist", .0.display())]
    Missing(PathBuf),

    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),

    #[error("Config validation failed:\n{}", format_errors(.0))]
    Validation(Vec<String>),

    #[error("config::get() called before config::init()")]
    NotInitialized,
}

fn format_errors(errors: &[String]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// PM Timing
// ============================================================================

/// Percent-deviation thresholds used to classify PM timing.
///
/// Deviation is `(actual - target) / target * 100`; negative means the part
/// was replaced before reaching its target life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PmTimingConfig {
    /// Below this deviation a PM is `Early`.
    #[serde(default = "default_early")]
    pub early_threshold: f64,

    /// Lower inclusive bound of the `On-Time` band.
    #[serde(default = "default_on_time_min")]
    pub on_time_min: f64,

    /// Upper inclusive bound of the `On-Time` band.
    #[serde(default = "default_on_time_max")]
    pub on_time_max: f64,

    /// Above this deviation (up to `overdue_threshold`) a PM is `Late`.
    #[serde(default = "default_late")]
    pub late_threshold: f64,

    /// Above this deviation a PM is `Overdue`.
    #[serde(default = "default_overdue")]
    pub overdue_threshold: f64,
}

fn default_early() -> f64 { -15.0 }
fn default_on_time_min() -> f64 { -15.0 }
fn default_on_time_max() -> f64 { 15.0 }
fn default_late() -> f64 { 15.0 }
fn default_overdue() -> f64 { 30.0 }

impl Default for PmTimingConfig {
    fn default() -> Self {
        Self {
            early_threshold: default_early(),
            on_time_min: default_on_time_min(),
            on_time_max: default_on_time_max(),
            late_threshold: default_late(),
            overdue_threshold: default_overdue(),
        }
    }
}

// ============================================================================
// Chronic Tools
// ============================================================================

/// Chronic tool detection thresholds, composite weights and severity tiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChronicToolsConfig {
    #[serde(default)]
    pub chronic_tool_threshold: ChronicThresholds,

    #[serde(default)]
    pub score_weights: ScoreWeights,

    #[serde(default)]
    pub severity_thresholds: SeverityThresholds,
}

/// Raw-metric thresholds for the chronic flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChronicThresholds {
    /// Unscheduled share of PM events above which a tool is chronic.
    #[serde(default = "default_unscheduled_rate")]
    pub unscheduled_pm_rate: f64,

    /// Coefficient of variation of PM life above which a tool is chronic.
    #[serde(default = "default_pm_life_variance")]
    pub pm_life_variance: f64,

    /// Minimum PM events before a tool can be flagged at all.
    #[serde(default = "default_min_pm_events")]
    pub min_pm_events: u32,
}

fn default_unscheduled_rate() -> f64 { 0.30 }
fn default_pm_life_variance() -> f64 { 0.40 }
fn default_min_pm_events() -> u32 { 5 }

impl Default for ChronicThresholds {
    fn default() -> Self {
        Self {
            unscheduled_pm_rate: default_unscheduled_rate(),
            pm_life_variance: default_pm_life_variance(),
            min_pm_events: default_min_pm_events(),
        }
    }
}

/// Composite chronic score weights. Must sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_weight_unscheduled")]
    pub unscheduled_pm_rate: f64,

    #[serde(default = "default_weight_variance")]
    pub pm_life_variance: f64,

    #[serde(default = "default_weight_downtime")]
    pub downtime_hours: f64,

    #[serde(default = "default_weight_reclean")]
    pub reclean_rate: f64,

    #[serde(default = "default_weight_sympathy")]
    pub sympathy_pm_rate: f64,
}

fn default_weight_unscheduled() -> f64 { 0.35 }
fn default_weight_variance() -> f64 { 0.25 }
fn default_weight_downtime() -> f64 { 0.20 }
fn default_weight_reclean() -> f64 { 0.10 }
fn default_weight_sympathy() -> f64 { 0.10 }

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.unscheduled_pm_rate
            + self.pm_life_variance
            + self.downtime_hours
            + self.reclean_rate
            + self.sympathy_pm_rate
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            unscheduled_pm_rate: default_weight_unscheduled(),
            pm_life_variance: default_weight_variance(),
            downtime_hours: default_weight_downtime(),
            reclean_rate: default_weight_reclean(),
            sympathy_pm_rate: default_weight_sympathy(),
        }
    }
}

/// Ascending composite-score cutoffs for the severity tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityThresholds {
    #[serde(default = "default_severity_low")]
    pub low: f64,

    #[serde(default = "default_severity_medium")]
    pub medium: f64,

    #[serde(default = "default_severity_high")]
    pub high: f64,

    #[serde(default = "default_severity_critical")]
    pub critical: f64,
}

fn default_severity_low() -> f64 { 25.0 }
fn default_severity_medium() -> f64 { 50.0 }
fn default_severity_high() -> f64 { 75.0 }
fn default_severity_critical() -> f64 { 90.0 }

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            low: default_severity_low(),
            medium: default_severity_medium(),
            high: default_severity_high(),
            critical: default_severity_critical(),
        }
    }
}

// ============================================================================
// Storage / Calendar / Data Quality
// ============================================================================

/// Where the embedded table store lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/pm_flex")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

/// Span of fiscal years written to the date dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Fiscal years before the current one.
    #[serde(default = "default_years_before")]
    pub years_before: i32,

    /// Total fiscal years generated.
    #[serde(default = "default_num_years")]
    pub num_years: u32,
}

fn default_years_before() -> i32 { DIM_DATE_YEARS_BEFORE }
fn default_num_years() -> u32 { DIM_DATE_NUM_YEARS }

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            years_before: default_years_before(),
            num_years: default_num_years(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataQualityConfig {
    /// Null percentage of a non-critical column above which a warning is logged.
    #[serde(default = "default_max_null_pct")]
    pub max_null_pct: f64,
}

fn default_max_null_pct() -> f64 { MAX_NULL_PCT }

impl Default for DataQualityConfig {
    fn default() -> Self {
        Self { max_null_pct: default_max_null_pct() }
    }
}

// ============================================================================
// Tests
// ============================================================================
