//! System-wide default constants.
//!
//! Centralises magic numbers used by the classification, aggregation and
//! rollup stages. Grouped by subsystem for easy discovery.

// ============================================================================
// Chronic Scoring
// ============================================================================

/// Reference downtime ceiling for the downtime factor (hours per PM).
///
/// `downtime_score = clip(avg_downtime_hours_per_pm / DOWNTIME_REFERENCE_HOURS * 100)`
pub const DOWNTIME_REFERENCE_HOURS: f64 = 10.0;

/// Allowed absolute deviation of the score-weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Upper bound of every normalized factor and of the composite score.
pub const MAX_SCORE: f64 = 100.0;

// ============================================================================
// Fiscal Calendar
// ============================================================================

/// Weeks per fiscal quarter (simplified 13-week quarters).
pub const WEEKS_PER_QUARTER: u32 = 13;

/// Weeks per fiscal month (simplified 4-week months).
pub const WEEKS_PER_MONTH: u32 = 4;

/// Fiscal years generated before the current one when populating `DimDate`.
pub const DIM_DATE_YEARS_BEFORE: i32 = 2;

/// Total fiscal years generated when populating `DimDate`.
pub const DIM_DATE_NUM_YEARS: u32 = 5;

// ============================================================================
// KPI Rollups
// ============================================================================

/// Trailing window length (periods) of the site-level rolling statistics.
pub const ROLLING_WINDOW_WEEKS: usize = 4;

/// Minimum observations before a rolling statistic is emitted.
///
/// 1 = always defined, shrinking at the start of a series.
pub const ROLLING_MIN_PERIODS: usize = 1;

// ============================================================================
// Data Quality
// ============================================================================

/// Null percentage above which a non-critical column is reported.
pub const MAX_NULL_PCT: f64 = 50.0;

/// Tool-population flag used when a raw row does not carry one.
pub const UNKNOWN_POPULATION_FLAG: &str = "UNKNOWN";

// ============================================================================
// Ingest
// ============================================================================

/// Maximum number of per-line CSV parse errors logged individually.
pub const MAX_LOGGED_PARSE_ERRORS: usize = 10;
