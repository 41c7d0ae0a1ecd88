//! PM Flex CSV parsing: quote-aware splitting, header mapping, row decoding.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet};

use crate::types::PmEvent;

// ============================================================================
// Column Names
// ============================================================================

pub const COL_RAW_ID: &str = "pm_flex_raw_id";
pub const COL_ENTITY: &str = "ENTITY";
pub const COL_FACILITY: &str = "FACILITY";
pub const COL_UNIQUE_ENTITY_ID: &str = "UNIQUE_ENTITY_ID";
pub const COL_CEID: &str = "CEID";
pub const COL_YEARWW: &str = "YEARWW";
pub const COL_TXN_DATE: &str = "TXN_DATE";
pub const COL_PM_NAME: &str = "PM_NAME";
pub const COL_ATTRIBUTE_NAME: &str = "ATTRIBUTE_NAME";
pub const COL_CUSTOM_DELTA: &str = "CUSTOM_DELTA";
pub const COL_MEDIAN_DELTA: &str = "Median_Delta";
pub const COL_DOWN_WINDOW_HR: &str = "DOWN_WINDOW_DURATION_HR";
pub const COL_DOWNTIME_TYPE: &str = "DOWNTIME_TYPE";
pub const COL_DOWNTIME_CLASS: &str = "DOWNTIME_CLASS";
pub const COL_DOWNTIME_SUBCLASS: &str = "DOWNTIME_SUBCLASS";
pub const COL_SUBCLASS_DETAILS: &str = "DOWNTIME_SUBCLASS_DETAILS";
pub const COL_REASON_DEEPDIVE: &str = "PM_Reason_Deepdive";
pub const COL_RECLEAN: &str = "Reclean_Label";
pub const COL_SYMPATHY: &str = "Sympathy_PM";
pub const COL_OUTLIER: &str = "DOWN_WINDOW_DURATION_OUTLIER_LABEL_FOR_PMCYCLE";
pub const COL_UTILIZATION: &str = "pm_cycle_utilization";
pub const COL_ALTAIR: &str = "AltairFlag";

/// Columns the engine cannot run without. Missing any is a schema error.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    COL_ENTITY,
    COL_FACILITY,
    COL_CEID,
    COL_YEARWW,
    COL_TXN_DATE,
    COL_DOWNTIME_TYPE,
    COL_CUSTOM_DELTA,
    COL_MEDIAN_DELTA,
];

/// Every column of the PM Flex export. Anything else is warned about.
const EXPORT_COLUMNS: &[&str] = &[
    "ENTITY", "FACILITY", "UNIQUE_ENTITY_ID", "SUPPLIER", "FUNCTIONAL_AREA",
    "TOOLSET", "CEID", "VFMFGID", "CUSTOM_MODULE_GROUP", "Dominant_Tech_Node",
    "PM_NAME", "ATTRIBUTE_NAME", "YEARWW", "TXN_DATE", "PREV_ATTRIBUTE_VALUE",
    "ATTRIBUTE_VALUE", "NEXT_ATTRIBUTE_VALUE", "CUSTOM_DELTA", "Lower_IQR_Limit_Delta",
    "Median_Delta", "Delta_75th_Percentile", "COUNTER_UPPER_VALUE", "UPPER_LIMIT_FACILITY",
    "upper_limit_perc_target", "Met_Upper_Limit", "PM_Label", "GVB_PMCycle_Label",
    "PMCycle_Counter_by_UEI_AttrName", "CHECKLIST_NAME", "CKL_START_TIME",
    "CKL_END_TIME", "CKL_DURATION_IN_HOURS", "NUM_STEPS_IN_CL",
    "MIN_OF_CKL_START_END_DISTANCE_TO_TXN_DATE", "CL_NAME_SIMILARITY_SCORE",
    "MOST_FREQUENT_CHECKLIST_FACILITY_CMG_TECHNODE", "DURATION_IN_HOURS_75TH_PERCENTILE",
    "pm_cycle_utilization", "reliable_upper_limit_insight", "TECHNODE_CEID_VFMFGID",
    "PARENT_ENTITY", "UNIQUE_PARENT_FAB", "SUB_ENTITY_ASSOCIATED_TO_ATTR",
    "ATTRIBUTE_NAME_ASSOCIATED_ENTITY", "num_of_resets_on_parent_txndate",
    "multiple_or_single_pm", "Sympathy_PM", "most_common_pm_grouping",
    "MOST_COMMON_PM_TYPE", "PM_FREQUENCY", "WINDOW_ID", "DOWN_WINDOW_START_TXN_DATE",
    "DOWN_WINDOW_END_TXN_DATE", "DOWN_WINDOW_DURATION_HR", "DOWN_WINDOW_DETAILS",
    "DOWN_WINDOW_COMMENTS", "ALL_STATES_IN_WINDOW", "WINDOW_TYPE", "DOWNTIME_TYPE",
    "DOWNTIME_CLASS", "DOWNTIME_SUBCLASS", "OLD_ENTITY_STATE", "NEW_ENTITY_STATE",
    "Reclean_Label", "Down_Window_Reclean_Rate",
    "DOWN_WINDOW_DURATION_OUTLIER_THRESHOLD_FOR_TOOLSET",
    "DOWN_WINDOW_DURATION_OUTLIER_LABEL_FOR_PMCYCLE", "WORKORDERID", "WO_TOOLNAME",
    "WO_DESCRIPTION", "PM_Reason_Deepdive", "DOWNTIME_SUBCLASS_DETAILS",
    "UPPER_LIMIT_THRESHOLD", "UPPER_VALUE_THRESHOLD", "VALUE_LOSS_AT_PMRESET",
    "PM_REDUCTION_ROI", "NORMALIZING_FACTOR", "PM_REDUCTION_ROI_NORMALIZED",
    "G2G_PER_PM", "EQUIPMENT_DOWNTIME_ROI(Hrs)", "PART_COST_PER_PM",
    "PART_COST_SAVING_ROI($)", "PM_DURATION", "MTS_NEEDED", "LABORHOUR_PER_PM",
    "LABORHOUR_PER_PM.1", "LABOR_HOUR_ROI(Hrs)", "HEADCOUNT_ROI(#)",
    // Added by upstream tooling
    "pm_flex_raw_id", "AltairFlag",
];

// ============================================================================
// CSV Quote-Aware Parsing
// ============================================================================

/// Split a CSV record respecting quoted fields (handles commas inside quotes).
/// Returns owned strings because quoted fields need unquoting.
pub fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    // Escaped quote ("")
                    if chars.peek() == Some(&'"') {
                        current.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// True while a record has an unterminated quoted field, meaning the next
/// physical line belongs to the same record.
pub fn has_open_quote(record: &str) -> bool {
    record.chars().filter(|c| *c == '"').count() % 2 == 1
}

// ============================================================================
// Column Map
// ============================================================================

/// Maps PM Flex column names to indices in the current file.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    index: HashMap<String, usize>,
    width: usize,
}

impl ColumnMap {
    /// Build from the header record. A leading UTF-8 BOM is ignored.
    pub fn from_header(header: &str) -> Self {
        let header = header.trim_start_matches('\u{feff}');
        let columns = csv_split(header);
        let width = columns.len();
        let index = columns
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        Self { index, width }
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub const fn width(&self) -> usize {
        self.width
    }

    /// Required columns absent from the header, sorted.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| !self.index.contains_key(*c))
            .collect();
        missing.sort_unstable();
        missing
    }

    /// Header columns that are not part of the known export, sorted.
    pub fn unexpected(&self) -> Vec<String> {
        let known: HashSet<&str> = EXPORT_COLUMNS.iter().copied().collect();
        let mut extra: Vec<String> = self
            .index
            .keys()
            .filter(|c| !known.contains(c.as_str()))
            .cloned()
            .collect();
        extra.sort();
        extra
    }

    /// Report which engine-relevant columns were found
    pub fn summary(&self) -> String {
        let mut found: Vec<&str> = Vec::new();
        let mut missing: Vec<&str> = Vec::new();

        macro_rules! check_col {
            ($name:expr) => {
                if self.index.contains_key($name) { found.push($name); } else { missing.push($name); }
            };
        }

        check_col!(COL_RAW_ID);
        for col in REQUIRED_COLUMNS {
            check_col!(col);
        }
        check_col!(COL_DOWN_WINDOW_HR);
        check_col!(COL_ATTRIBUTE_NAME);
        check_col!(COL_RECLEAN);
        check_col!(COL_SYMPATHY);
        check_col!(COL_OUTLIER);
        check_col!(COL_ALTAIR);

        format!(
            "Found {}/{} engine columns ({} total). Missing: [{}]",
            found.len(),
            found.len() + missing.len(),
            self.width,
            missing.join(", "),
        )
    }
}

// ============================================================================
// Field Decoding
// ============================================================================

fn is_null(s: &str) -> bool {
    s.is_empty()
        || s.eq_ignore_ascii_case("nan")
        || s.eq_ignore_ascii_case("null")
        || s.eq_ignore_ascii_case("none")
        || s == "-"
}

/// A row split into fields, decoded by column name.
pub struct Row<'a> {
    fields: &'a [String],
    columns: &'a ColumnMap,
}

impl<'a> Row<'a> {
    pub const fn new(fields: &'a [String], columns: &'a ColumnMap) -> Self {
        Self { fields, columns }
    }

    fn raw(&self, name: &str) -> Option<&'a str> {
        let idx = self.columns.get(name)?;
        let s = self.fields.get(idx)?.trim();
        (!is_null(s)).then_some(s)
    }

    pub fn get_str(&self, name: &str) -> Option<String> {
        self.raw(name).map(str::to_string)
    }

    /// Numeric field. Unparseable or non-finite values are null.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.raw(name)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    /// 0/1 label. Only an explicit 1 (or true/yes) is true.
    pub fn get_flag(&self, name: &str) -> Option<bool> {
        let s = self.raw(name)?;
        if let Ok(v) = s.parse::<f64>() {
            return v.is_finite().then_some((v - 1.0).abs() < f64::EPSILON);
        }
        match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" => Some(true),
            "false" | "no" | "n" => Some(false),
            _ => None,
        }
    }

    pub fn get_datetime(&self, name: &str) -> Option<NaiveDateTime> {
        self.raw(name).and_then(parse_datetime)
    }
}

/// Parse the timestamp formats seen in PM Flex exports, keeping wall-clock time.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim().trim_matches('"');

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.naive_local());
    }

    for fmt in &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    for fmt in &["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// Stable id for a row without an explicit `pm_flex_raw_id`: MD5 of the record text.
pub fn row_fingerprint(record: &str) -> String {
    format!("{:x}", md5::compute(record.trim_end().as_bytes()))
}

/// Decode one record into a `PmEvent`.
///
/// Fails only when the field count does not match the header; individual
/// bad values degrade to null.
pub fn parse_row(record: &str, columns: &ColumnMap) -> Result<PmEvent, String> {
    let fields = csv_split(record);
    if fields.len() != columns.width() {
        return Err(format!(
            "expected {} fields, found {}",
            columns.width(),
            fields.len()
        ));
    }
    let row = Row::new(&fields, columns);

    let id = row
        .get_str(COL_RAW_ID)
        .unwrap_or_else(|| row_fingerprint(record));
    let mut event = PmEvent::new(id);

    event.entity = row.get_str(COL_ENTITY);
    event.facility = row.get_str(COL_FACILITY);
    event.unique_entity_id = row.get_str(COL_UNIQUE_ENTITY_ID);
    event.ceid = row.get_str(COL_CEID);
    event.yearww = row.get_str(COL_YEARWW);
    event.txn_date = row.get_datetime(COL_TXN_DATE);
    event.pm_name = row.get_str(COL_PM_NAME);
    event.attribute_name = row.get_str(COL_ATTRIBUTE_NAME);
    event.custom_delta = row.get_f64(COL_CUSTOM_DELTA);
    event.median_delta = row.get_f64(COL_MEDIAN_DELTA);
    event.down_window_duration_hr = row.get_f64(COL_DOWN_WINDOW_HR);
    event.downtime_type = row.get_str(COL_DOWNTIME_TYPE);
    event.downtime_class = row.get_str(COL_DOWNTIME_CLASS);
    event.downtime_subclass = row.get_str(COL_DOWNTIME_SUBCLASS);
    event.downtime_subclass_details = row.get_str(COL_SUBCLASS_DETAILS);
    event.pm_reason_deepdive = row.get_str(COL_REASON_DEEPDIVE);
    event.reclean_label = row.get_flag(COL_RECLEAN);
    event.sympathy_pm = row.get_flag(COL_SYMPATHY);
    event.duration_outlier = row.get_flag(COL_OUTLIER);
    event.pm_cycle_utilization = row.get_f64(COL_UTILIZATION);
    if let Some(flag) = row.get_str(COL_ALTAIR) {
        event.altair_flag = flag;
    }

    Ok(event)
}
