//! Weekly drop-folder discovery.
//!
//! Exports land as `<root>/<YYYYWWnn>/PM_Flex.csv`, one folder per fiscal
//! week.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::IngestError;
use crate::calendar::{FiscalCalendar, FiscalWeek};

/// File name of the export inside each weekly folder.
pub const EXPORT_FILE_NAME: &str = "PM_Flex.csv";

/// Default number of weeks to look back for the latest export.
pub const DEFAULT_MAX_WEEKS_BACK: u32 = 4;

/// Existing, regular, non-empty file.
pub fn validate_file(path: &Path) -> Result<(), IngestError> {
    let meta = std::fs::metadata(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if !meta.is_file() {
        return Err(IngestError::NotAFile(path.to_path_buf()));
    }
    if meta.len() == 0 {
        return Err(IngestError::EmptyFile(path.to_path_buf()));
    }
    Ok(())
}

/// Weekly folder layout under a root directory.
pub struct WeeklyDrop<'a> {
    root: PathBuf,
    calendar: &'a dyn FiscalCalendar,
}

impl<'a> WeeklyDrop<'a> {
    pub fn new(root: impl Into<PathBuf>, calendar: &'a dyn FiscalCalendar) -> Self {
        Self {
            root: root.into(),
            calendar,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for_week(&self, week: FiscalWeek) -> PathBuf {
        self.root.join(week.to_string()).join(EXPORT_FILE_NAME)
    }

    /// The export for `week`, if present.
    pub fn find_file_for_week(&self, week: FiscalWeek) -> Option<PathBuf> {
        let path = self.path_for_week(week);
        if path.is_file() {
            debug!(week = %week, path = %path.display(), "Found export");
            Some(path)
        } else {
            None
        }
    }

    /// Newest export within `max_weeks_back` weeks of `today`'s fiscal week.
    pub fn find_latest_file(
        &self,
        today: NaiveDate,
        max_weeks_back: u32,
    ) -> Result<(FiscalWeek, PathBuf), IngestError> {
        let current = self.calendar.week_of(today)?;
        for back in 0..=max_weeks_back {
            let week = self.calendar.offset_week(current, -i64::from(back))?;
            if let Some(path) = self.find_file_for_week(week) {
                if back > 0 {
                    warn!(week = %week, current = %current, "No export for current week, using {back} week(s) old file");
                }
                info!(week = %week, path = %path.display(), "Latest PM Flex export");
                return Ok((week, path));
            }
        }
        Err(IngestError::NoExportFound {
            root: self.root.clone(),
            from: current.to_string(),
            weeks_back: max_weeks_back,
        })
    }

    /// Weeks with an export present, newest first.
    pub fn list_available_weeks(&self) -> Result<Vec<FiscalWeek>, IngestError> {
        let entries = std::fs::read_dir(&self.root).map_err(|source| IngestError::Io {
            path: self.root.clone(),
            source,
        })?;

        let mut weeks: Vec<FiscalWeek> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.len() != 8 || !name.contains("WW") {
                    return None;
                }
                let week = self.calendar.parse_week(&name).ok()?;
                entry.path().join(EXPORT_FILE_NAME).is_file().then_some(week)
            })
            .collect();
        weeks.sort_unstable_by(|a, b| b.cmp(a));
        Ok(weeks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::IntelCalendar;
    use std::fs;

    fn drop_week(root: &Path, week: &str, content: &str) {
        let dir = root.join(week);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(EXPORT_FILE_NAME), content).unwrap();
    }

    #[test]
    fn test_find_and_list() {
        let tmp = tempfile::tempdir().unwrap();
        drop_week(tmp.path(), "2025WW08", "ENTITY\n");
        drop_week(tmp.path(), "2025WW10", "ENTITY\n");
        fs::create_dir_all(tmp.path().join("2025WW11")).unwrap();
        fs::create_dir_all(tmp.path().join("archive")).unwrap();
        // Well-formed name, but no such week in the fiscal year
        drop_week(tmp.path(), "2025WW60", "ENTITY\n");

        let calendar = IntelCalendar::new();
        let drop = WeeklyDrop::new(tmp.path(), &calendar);

        assert_eq!(
            drop.list_available_weeks().unwrap(),
            vec![FiscalWeek::new(2025, 10), FiscalWeek::new(2025, 8)]
        );
        assert!(drop.find_file_for_week(FiscalWeek::new(2025, 11)).is_none());

        // 2025-03-12 falls in 2025WW11, whose folder has no export
        let today = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        let (week, path) = drop.find_latest_file(today, DEFAULT_MAX_WEEKS_BACK).unwrap();
        assert_eq!(week, FiscalWeek::new(2025, 10));
        assert!(path.ends_with("2025WW10/PM_Flex.csv"));

        let err = drop.find_latest_file(today, 0).unwrap_err();
        assert!(matches!(err, IngestError::NoExportFound { .. }));
    }

    #[test]
    fn test_validate_file() {
        let tmp = tempfile::tempdir().unwrap();
        let empty = tmp.path().join("empty.csv");
        fs::write(&empty, "").unwrap();
        assert!(matches!(validate_file(&empty), Err(IngestError::EmptyFile(_))));
        assert!(matches!(validate_file(tmp.path()), Err(IngestError::NotAFile(_))));
        assert!(matches!(
            validate_file(&tmp.path().join("missing.csv")),
            Err(IngestError::Io { .. })
        ));
    }
}
