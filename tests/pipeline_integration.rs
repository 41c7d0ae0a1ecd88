//! Pipeline Integration Tests
//!
//! Runs load → enrich → KPI over small hand-built exports and checks every
//! table the pipeline writes. Covers chronic flagging, incremental re-runs,
//! full reprocessing and persistence across a sled reopen.

use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};

use pm_flex::calendar::IntelCalendar;
use pm_flex::config::PmFlexConfig;
use pm_flex::storage::{InMemoryStore, SledStore, Table, TableStore, TableStoreExt};
use pm_flex::types::{
    ChronicHistoryRow, ChronicScoreRecord, RunStamp, RunStatus, Severity, SiteKpiRow,
};
use pm_flex::{Pipeline, PipelineOptions};

const HEADER: &str = "ENTITY,FACILITY,CEID,PM_NAME,ATTRIBUTE_NAME,YEARWW,TXN_DATE,\
CUSTOM_DELTA,Median_Delta,DOWN_WINDOW_DURATION_HR,DOWNTIME_TYPE,PM_Reason_Deepdive";

/// T1 has five events, two unscheduled (rate 0.4 > 0.3): chronic.
/// T2 has three scheduled events, under the five-event minimum.
const WW10_WW11: &str = "\
T1,F32,ETCH,CHUCK_PM,CHUCK,2025WW10,2025-03-03 08:00:00,1000,1000,4,Scheduled,Planned PM
T1,F32,ETCH,CHUCK_PM,CHUCK,2025WW10,2025-03-04 08:00:00,1000,1000,4,Unscheduled,\"Arcing, chamber open\"
T1,F32,ETCH,CHUCK_PM,CHUCK,2025WW10,2025-03-06 08:00:00,1000,1000,4,Scheduled,Planned PM
T1,F32,ETCH,CHUCK_PM,CHUCK,2025WW11,2025-03-10 08:00:00,1000,1000,4,Unscheduled,Particles
T1,F32,ETCH,CHUCK_PM,CHUCK,2025WW11,2025-03-12 08:00:00,1000,1000,4,Scheduled,Planned PM
T2,F32,ETCH,CHUCK_PM,CHUCK,2025WW10,2025-03-03 09:00:00,1000,1000,4,Scheduled,Planned PM
T2,F32,ETCH,CHUCK_PM,CHUCK,2025WW10,2025-03-05 09:00:00,1000,1000,4,Scheduled,Planned PM
T2,F32,ETCH,CHUCK_PM,CHUCK,2025WW11,2025-03-11 09:00:00,1000,1000,4,Scheduled,Planned PM
";

const WW12: &str = "\
T1,F32,ETCH,CHUCK_PM,CHUCK,2025WW12,2025-03-17 08:00:00,1000,1000,4,Scheduled,Planned PM
";

// ============================================================================
// Helpers
// ============================================================================

fn stamp(day: u32) -> RunStamp {
    RunStamp::at(at(day))
}

fn at(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, day)
        .unwrap()
        .and_hms_opt(18, 0, 0)
        .unwrap()
}

fn write_export(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("{HEADER}\n{body}")).unwrap();
    path
}

fn run(store: &dyn TableStore, csv: Option<PathBuf>, full: bool, day: u32) -> pm_flex::PipelineReport {
    let config = PmFlexConfig::default();
    let calendar = IntelCalendar::new();
    let options = PipelineOptions {
        csv,
        full,
        ..PipelineOptions::default()
    };
    Pipeline::new(store, &config, &calendar)
        .run(&options, &stamp(day))
        .unwrap()
}

fn counts(store: &dyn TableStore) -> Vec<(Table, usize)> {
    Table::ALL
        .into_iter()
        .filter(|t| *t != Table::DimDate)
        .map(|t| (t, store.count(t).unwrap()))
        .collect()
}

// ============================================================================
// End-to-End
// ============================================================================

#[test]
fn chronic_tool_flows_through_every_table() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_export(dir.path(), "PM_Flex.csv", WW10_WW11);
    let store = InMemoryStore::new();

    let report = run(&store, Some(csv), false, 20);
    let load = report.load.as_ref().unwrap();
    assert_eq!(load.rows_loaded, 8);
    assert_eq!(load.errors, 0);
    assert_eq!(report.enrichment.status, RunStatus::Success);
    assert_eq!(report.enrichment.chronic_tools_analyzed, 2);
    assert_eq!(report.enrichment.chronic_tools_flagged, 1);
    assert_eq!(report.kpi.status, RunStatus::Success);
    assert_eq!(report.run_id, "20250320_180000");

    assert_eq!(store.count(Table::Raw).unwrap(), 8);
    assert_eq!(store.count(Table::Enriched).unwrap(), 8);
    assert_eq!(store.count(Table::DowntimeSummary).unwrap(), 2);
    assert_eq!(store.count(Table::SiteKpis).unwrap(), 2);
    assert_eq!(store.count(Table::CeidKpis).unwrap(), 2);
    assert_eq!(store.count(Table::PartReplacement).unwrap(), 4);
    assert_eq!(store.count(Table::ChronicHistory).unwrap(), 4);
    assert!(store.count(Table::DimDate).unwrap() > 0);

    let records: Vec<ChronicScoreRecord> = store.fetch_rows(Table::ChronicTools).unwrap();
    let t1 = records.iter().find(|r| r.aggregate.entity == "T1").unwrap();
    assert!(t1.chronic_flag);
    assert_eq!(t1.aggregate.total_pm_events, 5);
    assert_eq!(t1.aggregate.unscheduled_pm_count, 2);
    // unscheduled factor clips at 100 (x0.35), downtime 4h of 10h (x0.20)
    assert!((t1.chronic_score - 43.0).abs() < 1e-9, "score {}", t1.chronic_score);
    assert_eq!(t1.chronic_severity, Some(Severity::Low));

    let t2 = records.iter().find(|r| r.aggregate.entity == "T2").unwrap();
    assert!(!t2.chronic_flag);
    assert_eq!(t2.chronic_severity, None);

    let site: Vec<SiteKpiRow> = store.fetch_rows(Table::SiteKpis).unwrap();
    let ww10 = site.iter().find(|r| r.ww_number == 10).unwrap();
    assert_eq!(ww10.measures.total_pm_events, 5);
    assert_eq!(ww10.measures.unscheduled_pm_count, 1);
    assert_eq!(ww10.total_tools_count, 2);
    assert_eq!(ww10.chronic_tools_count, 1);
    assert!((ww10.chronic_tools_pct - 50.0).abs() < 1e-9);
    assert_eq!(ww10.rolling_4wk_pm_count, Some(5));

    let ww11 = site.iter().find(|r| r.ww_number == 11).unwrap();
    assert_eq!(ww11.measures.total_pm_events, 3);
    assert_eq!(ww11.rolling_4wk_pm_count, Some(8));
    assert!((ww11.rolling_4wk_downtime_hours.unwrap() - 32.0).abs() < 1e-9);
}

#[test]
fn rerun_without_new_input_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_export(dir.path(), "PM_Flex.csv", WW10_WW11);
    let store = InMemoryStore::new();

    run(&store, Some(csv.clone()), false, 20);
    let before = counts(&store);

    let again = run(&store, Some(csv), false, 21);
    let load = again.load.as_ref().unwrap();
    assert_eq!(load.rows_loaded, 0);
    assert_eq!(load.duplicates, 8);
    assert_eq!(again.enrichment.status, RunStatus::NoData);
    assert_eq!(again.kpi.status, RunStatus::NoData);
    assert_eq!(counts(&store), before);
}

#[test]
fn new_week_extends_history_and_tracks_status_change() {
    let dir = tempfile::tempdir().unwrap();
    let store = InMemoryStore::new();
    run(&store, Some(write_export(dir.path(), "a.csv", WW10_WW11)), false, 20);
    run(&store, Some(write_export(dir.path(), "b.csv", WW12)), false, 22);

    assert_eq!(store.count(Table::Raw).unwrap(), 9);
    assert_eq!(store.count(Table::SiteKpis).unwrap(), 3);

    let history: Vec<ChronicHistoryRow> = store.fetch_rows(Table::ChronicHistory).unwrap();
    // WW12 x both tools' latest records
    assert_eq!(history.len(), 6);
    let t1_ww12 = history
        .iter()
        .find(|r| r.entity == "T1" && r.ww_number == 12)
        .unwrap();
    // Six T1 events over WW10-WW12, two unscheduled: still chronic at 43
    assert!(t1_ww12.chronic_flag);
    assert!(!t1_ww12.status_changed);
    assert!(t1_ww12.chronic_score_change.abs() < 1e-9);

    let records: Vec<ChronicScoreRecord> = store.fetch_rows(Table::ChronicTools).unwrap();
    let t1_latest = records
        .iter()
        .filter(|r| r.aggregate.entity == "T1")
        .max_by_key(|r| r.calculation_timestamp)
        .unwrap();
    assert_eq!(t1_latest.aggregate.total_pm_events, 6);
    assert_eq!(t1_latest.aggregate.unscheduled_pm_count, 2);
    assert!((t1_latest.chronic_score - 43.0).abs() < 1e-9);
    // T2 had nothing new in WW12 and keeps its single record
    assert_eq!(records.iter().filter(|r| r.aggregate.entity == "T2").count(), 1);

    let site: Vec<SiteKpiRow> = store.fetch_rows(Table::SiteKpis).unwrap();
    let ww12 = site.iter().find(|r| r.ww_number == 12).unwrap();
    assert_eq!(ww12.rolling_4wk_pm_count, Some(9));
}

#[test]
fn full_reprocess_rebuilds_the_same_tables() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_export(dir.path(), "PM_Flex.csv", WW10_WW11);
    let store = InMemoryStore::new();

    run(&store, Some(csv), false, 20);
    let before = counts(&store);

    let full = run(&store, None, true, 21);
    assert!(full.load.is_none());
    assert_eq!(full.enrichment.rows_processed, 8);
    assert_eq!(full.kpi.status, RunStatus::Success);
    assert_eq!(counts(&store), before);

    let records: Vec<ChronicScoreRecord> = store.fetch_rows(Table::ChronicTools).unwrap();
    assert!(records.iter().all(|r| r.etl_run_id == "20250321_180000"));
}

#[test]
fn sled_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_export(dir.path(), "PM_Flex.csv", WW10_WW11);
    let db = dir.path().join("db");

    let before = {
        let store = SledStore::open(&db).unwrap();
        run(&store, Some(csv.clone()), false, 20);
        counts(&store)
    };

    let store = SledStore::open(&db).unwrap();
    assert_eq!(counts(&store), before);

    let again = run(&store, Some(csv), false, 21);
    assert_eq!(again.load.unwrap().rows_loaded, 0);
    assert_eq!(again.enrichment.status, RunStatus::NoData);
    assert_eq!(counts(&store), before);
}

#[test]
fn missing_required_column_aborts_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.csv");
    std::fs::write(&path, "ENTITY,FACILITY\nT1,F32\n").unwrap();

    let store = InMemoryStore::new();
    let config = PmFlexConfig::default();
    let calendar = IntelCalendar::new();
    let options = PipelineOptions {
        csv: Some(path),
        ..PipelineOptions::default()
    };
    let result = Pipeline::new(&store, &config, &calendar).run(&options, &stamp(20));
    assert!(matches!(result, Err(pm_flex::PipelineError::Ingest(_))));
    assert_eq!(store.count(Table::Raw).unwrap(), 0);
}
