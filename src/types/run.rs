//! Run identity attached to every derived row.

use chrono::{Local, NaiveDateTime};

/// Run id and wall-clock time shared by all rows written in one stage run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStamp {
    pub run_id: String,
    pub at: NaiveDateTime,
}

impl RunStamp {
    /// Stamp for a run starting now. The id is the local start time, `YYYYMMDD_HHMMSS`.
    pub fn now() -> Self {
        let at = Local::now().naive_local();
        Self::at(at)
    }

    pub fn at(at: NaiveDateTime) -> Self {
        Self {
            run_id: at.format("%Y%m%d_%H%M%S").to_string(),
            at,
        }
    }
}

/// Outcome of a stage that ran without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RunStatus {
    Success,
    /// Nothing new to process
    NoData,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("SUCCESS"),
            Self::NoData => f.write_str("NO_DATA"),
        }
    }
}
