//! CSV Ingest Tests
//!
//! Weekly drop discovery, population flags and raw loading against a real
//! directory tree, followed by filtered reads of the raw table.

use chrono::NaiveDate;
use std::path::Path;

use pm_flex::calendar::{FiscalWeek, IntelCalendar};
use pm_flex::ingest::discovery::EXPORT_FILE_NAME;
use pm_flex::ingest::{fetch_raw_events, EventFilter, IngestError, PopulationFlags, RawLoader, WeeklyDrop};
use pm_flex::storage::{InMemoryStore, Table, TableStore};

const EXPORT: &str = "\
ENTITY,FACILITY,CEID,YEARWW,TXN_DATE,DOWNTIME_TYPE,CUSTOM_DELTA,Median_Delta,WO_DESCRIPTION,AltairFlag
T1,F32,ETCH,2025WW11,2025-03-10 08:00:00,Scheduled,1000,1000,\"Replace chuck,
verify leak rate\",
T2,F32,ETCH,2025WW11,2025-03-11 08:00:00,Unscheduled,800,1000,Arcing,1
T3,F28,DEPO,2025WW11,2025-03-14 08:00:00,Scheduled,,1000,,
";

fn drop_export(root: &Path, week: &str, body: &str) {
    let dir = root.join(week);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(EXPORT_FILE_NAME), body).unwrap();
}

#[test]
fn newest_drop_is_found_and_loaded_with_population_flags() {
    let root = tempfile::tempdir().unwrap();
    drop_export(root.path(), "2025WW09", EXPORT);
    drop_export(root.path(), "2025WW11", EXPORT);
    std::fs::create_dir_all(root.path().join("2025WW10")).unwrap();
    std::fs::create_dir_all(root.path().join("archive")).unwrap();

    let calendar = IntelCalendar::new();
    let drops = WeeklyDrop::new(root.path(), &calendar);
    assert_eq!(
        drops.list_available_weeks().unwrap(),
        vec![FiscalWeek::new(2025, 11), FiscalWeek::new(2025, 9)]
    );

    // 2025-03-20 falls in WW12, which has no drop yet
    let today = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();
    let (week, path) = drops.find_latest_file(today, 4).unwrap();
    assert_eq!(week, FiscalWeek::new(2025, 11));

    let flags = PopulationFlags::parse("ENTITY,ProcessAllowed\nT1,1\nT2,0\n", "flags.csv").unwrap();
    let store = InMemoryStore::new();
    let stats = RawLoader::new(&store)
        .with_population_flags(&flags)
        .load_csv(&path)
        .unwrap();

    assert_eq!(stats.records_read, 3);
    assert_eq!(stats.rows_loaded, 3);
    assert_eq!(stats.errors, 0);
    // T2 already carries a flag in the export
    assert_eq!(stats.population_flags_applied, 1);

    let events = fetch_raw_events(&store, &EventFilter::default()).unwrap();
    let flag_of = |tool: &str| {
        events
            .iter()
            .find(|e| e.entity.as_deref() == Some(tool))
            .map(|e| e.altair_flag.clone())
            .unwrap()
    };
    assert_eq!(flag_of("T1"), "1");
    assert_eq!(flag_of("T2"), "1");
    assert_eq!(flag_of("T3"), "UNKNOWN");

    let t3 = events.iter().find(|e| e.entity.as_deref() == Some("T3")).unwrap();
    assert_eq!(t3.custom_delta, None);
    assert!(t3.source_file.as_deref().is_some_and(|s| s.ends_with(EXPORT_FILE_NAME)));
    assert!(t3.load_timestamp.is_some());
}

#[test]
fn no_drop_within_window_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    drop_export(root.path(), "2025WW01", EXPORT);

    let calendar = IntelCalendar::new();
    let drops = WeeklyDrop::new(root.path(), &calendar);
    let today = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();
    assert!(matches!(
        drops.find_latest_file(today, 4),
        Err(IngestError::NoExportFound { weeks_back: 4, .. })
    ));
}

#[test]
fn empty_export_file_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    drop_export(root.path(), "2025WW11", "");
    let path = root.path().join("2025WW11").join(EXPORT_FILE_NAME);

    let store = InMemoryStore::new();
    let result = RawLoader::new(&store).load_csv(&path);
    assert!(matches!(result, Err(IngestError::EmptyFile(_))));
    assert_eq!(store.count(Table::Raw).unwrap(), 0);
}

#[test]
fn date_filter_is_half_open_and_incremental_skips_enriched() {
    let store = InMemoryStore::new();
    RawLoader::new(&store)
        .load_reader(EXPORT.as_bytes(), "inline")
        .unwrap();

    let day = |d| NaiveDate::from_ymd_opt(2025, 3, d).unwrap().and_hms_opt(0, 0, 0);
    let window = EventFilter {
        start: day(10),
        end: day(14),
        incremental: false,
    };
    let events = fetch_raw_events(&store, &window).unwrap();
    let tools: Vec<_> = events.iter().filter_map(|e| e.entity.as_deref()).collect();
    assert_eq!(tools, ["T1", "T2"]);

    // Nothing enriched yet, so the anti-join keeps everything
    assert_eq!(fetch_raw_events(&store, &EventFilter::incremental()).unwrap().len(), 3);
}
