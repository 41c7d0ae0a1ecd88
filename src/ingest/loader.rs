//! Raw PM Flex CSV loader (bronze layer).
//!
//! Reads an export, validates its header, decodes rows into `PmEvent`s,
//! drops ids already stored and appends the rest to the raw table.
//!
//! Loading the same file twice adds nothing the second time.

use chrono::{Local, NaiveDateTime};
use std::collections::HashSet;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use super::csv::{has_open_quote, parse_row, ColumnMap};
use super::population::PopulationFlags;
use super::quality::{critical_fields, NullReport};
use super::{stored_ids, IngestError};
use crate::config::defaults::{MAX_LOGGED_PARSE_ERRORS, MAX_NULL_PCT};
use crate::storage::{Table, TableStore, TableStoreExt};
use crate::types::PmEvent;

/// Outcome of one load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadStats {
    pub source: String,
    pub records_read: usize,
    pub rows_loaded: usize,
    /// Ids already in the raw table or repeated within the file
    pub duplicates: usize,
    /// Records that could not be decoded
    pub errors: usize,
    pub unexpected_columns: Vec<String>,
    pub population_flags_applied: usize,
    pub elapsed_secs: f64,
}

/// Loads PM Flex exports into the raw table of a store.
pub struct RawLoader<'a> {
    store: &'a dyn TableStore,
    max_null_pct: f64,
    population: Option<&'a PopulationFlags>,
}

impl<'a> RawLoader<'a> {
    pub fn new(store: &'a dyn TableStore) -> Self {
        Self {
            store,
            max_null_pct: MAX_NULL_PCT,
            population: None,
        }
    }

    #[must_use]
    pub const fn with_max_null_pct(mut self, max_null_pct: f64) -> Self {
        self.max_null_pct = max_null_pct;
        self
    }

    #[must_use]
    pub const fn with_population_flags(mut self, flags: &'a PopulationFlags) -> Self {
        self.population = Some(flags);
        self
    }

    /// Load a CSV file from disk.
    pub fn load_csv(&self, path: &Path) -> Result<LoadStats, IngestError> {
        super::discovery::validate_file(path)?;
        let file = std::fs::File::open(path).map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loading PM Flex export");
        self.load_reader(BufReader::new(file), &path.display().to_string())
    }

    /// Load CSV text from any reader. `source_name` is recorded on each row.
    pub fn load_reader<R: BufRead>(&self, reader: R, source_name: &str) -> Result<LoadStats, IngestError> {
        let started = Instant::now();
        let load_timestamp = Local::now().naive_local();
        let read_err = |source: std::io::Error| IngestError::Io {
            path: source_name.into(),
            source,
        };

        let mut lines = reader.lines();
        let header = match lines.next() {
            Some(line) => line.map_err(read_err)?,
            None => return Err(IngestError::EmptyFile(source_name.into())),
        };

        let columns = ColumnMap::from_header(&header);
        let missing = columns.missing_required();
        if !missing.is_empty() {
            return Err(IngestError::Schema {
                source_name: source_name.to_string(),
                missing: missing.iter().map(ToString::to_string).collect(),
            });
        }
        let unexpected = columns.unexpected();
        if !unexpected.is_empty() {
            warn!(
                source = source_name,
                count = unexpected.len(),
                "Unexpected columns will be ignored: {}",
                unexpected.join(", ")
            );
        }
        info!("PM Flex columns: {}", columns.summary());

        let mut seen = stored_ids(self.store, Table::Raw)?;
        let mut events: Vec<PmEvent> = Vec::new();
        let mut stats = LoadStats {
            source: source_name.to_string(),
            unexpected_columns: unexpected,
            ..LoadStats::default()
        };

        let mut pending = String::new();
        let mut record_line = 0;
        for (idx, line) in lines.enumerate() {
            let line = line.map_err(read_err)?;
            if pending.is_empty() {
                if line.trim().is_empty() {
                    continue;
                }
                record_line = idx + 2;
            } else {
                pending.push('\n');
            }
            pending.push_str(&line);
            if has_open_quote(&pending) {
                continue;
            }

            let record = std::mem::take(&mut pending);
            self.decode(&record, record_line, &columns, &mut seen, &mut events, &mut stats, source_name, load_timestamp);
        }
        if !pending.is_empty() {
            // Unterminated quote at end of input
            self.decode(&pending, record_line, &columns, &mut seen, &mut events, &mut stats, source_name, load_timestamp);
        }

        if stats.errors > MAX_LOGGED_PARSE_ERRORS {
            warn!(
                "... and {} more parse errors",
                stats.errors - MAX_LOGGED_PARSE_ERRORS
            );
        }

        if let Some(flags) = self.population {
            stats.population_flags_applied = flags.apply(&mut events);
        }

        if !events.is_empty() {
            NullReport::profile(&events, &critical_fields()).warn_exceeding(self.max_null_pct, "load");
        }

        stats.rows_loaded = self.store.append_rows(Table::Raw, &events)?;
        stats.elapsed_secs = started.elapsed().as_secs_f64();

        info!(
            source = source_name,
            read = stats.records_read,
            loaded = stats.rows_loaded,
            duplicates = stats.duplicates,
            errors = stats.errors,
            "Raw load complete in {:.2}s",
            stats.elapsed_secs
        );
        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn decode(
        &self,
        record: &str,
        line_no: usize,
        columns: &ColumnMap,
        seen: &mut HashSet<String>,
        events: &mut Vec<PmEvent>,
        stats: &mut LoadStats,
        source_name: &str,
        load_timestamp: NaiveDateTime,
    ) {
        stats.records_read += 1;
        match parse_row(record, columns) {
            Ok(mut event) => {
                if !seen.insert(event.pm_flex_raw_id.clone()) {
                    stats.duplicates += 1;
                    return;
                }
                event.source_file = Some(source_name.to_string());
                event.load_timestamp = Some(load_timestamp);
                events.push(event);
            }
            Err(e) => {
                stats.errors += 1;
                if stats.errors <= MAX_LOGGED_PARSE_ERRORS {
                    warn!(source = source_name, line = line_no, "Skipping record: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    const CSV: &str = "\
ENTITY,FACILITY,CEID,YEARWW,TXN_DATE,DOWNTIME_TYPE,CUSTOM_DELTA,Median_Delta,WO_DESCRIPTION
T1,F32,ETCH,2025WW10,2025-03-03 10:00:00,Scheduled,1000,1000,routine
T1,F32,ETCH,2025WW11,2025-03-10 10:00:00,Unscheduled,600,1000,\"leak
found on chamber, lid\"

T2,F32,ETCH,2025WW11,2025-03-11 10:00:00,Scheduled,1200,1000
";

    #[test]
    fn test_load_multiline_and_bad_rows() {
        let store = InMemoryStore::new();
        let stats = RawLoader::new(&store).load_reader(CSV.as_bytes(), "mem.csv").unwrap();
        assert_eq!(stats.records_read, 3);
        assert_eq!(stats.rows_loaded, 2);
        assert_eq!(stats.errors, 1, "T2 row is one field short");

        let rows: Vec<PmEvent> = store.fetch_rows(Table::Raw).unwrap();
        assert_eq!(rows[1].custom_delta, Some(600.0));
        assert_eq!(rows[1].source_file.as_deref(), Some("mem.csv"));
        assert!(rows[1].load_timestamp.is_some());
    }

    #[test]
    fn test_reload_adds_nothing() {
        let store = InMemoryStore::new();
        let loader = RawLoader::new(&store);
        loader.load_reader(CSV.as_bytes(), "a.csv").unwrap();
        let again = loader.load_reader(CSV.as_bytes(), "b.csv").unwrap();
        assert_eq!(again.rows_loaded, 0);
        assert_eq!(again.duplicates, 2);
        assert_eq!(store.count(Table::Raw).unwrap(), 2);
    }

    #[test]
    fn test_missing_required_column_is_fatal() {
        let store = InMemoryStore::new();
        let err = RawLoader::new(&store)
            .load_reader("ENTITY,FACILITY\nT1,F32\n".as_bytes(), "bad.csv")
            .unwrap_err();
        assert!(matches!(err, IngestError::Schema { .. }));
        assert_eq!(store.count(Table::Raw).unwrap(), 0);
    }

    #[test]
    fn test_empty_input() {
        let store = InMemoryStore::new();
        let err = RawLoader::new(&store).load_reader("".as_bytes(), "empty.csv").unwrap_err();
        assert!(matches!(err, IngestError::EmptyFile(_)));
    }

    #[test]
    fn test_explicit_ids_and_population_flags() {
        let csv = "\
pm_flex_raw_id,ENTITY,FACILITY,CEID,YEARWW,TXN_DATE,DOWNTIME_TYPE,CUSTOM_DELTA,Median_Delta
r1,T1,F32,ETCH,2025WW10,2025-03-03,Scheduled,1000,1000
r1,T1,F32,ETCH,2025WW10,2025-03-03,Scheduled,1100,1000
r2,T2,F32,ETCH,2025WW10,2025-03-04,Scheduled,900,1000
";
        let flags = PopulationFlags::parse("ENTITY,ProcessAllowed\nT2,Altair\n", "mem").unwrap();
        let store = InMemoryStore::new();
        let stats = RawLoader::new(&store)
            .with_population_flags(&flags)
            .load_reader(csv.as_bytes(), "ids.csv")
            .unwrap();
        assert_eq!(stats.rows_loaded, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.population_flags_applied, 1);

        let rows: Vec<PmEvent> = store.fetch_rows(Table::Raw).unwrap();
        assert_eq!(rows[0].pm_flex_raw_id, "r1");
        assert_eq!(rows[0].custom_delta, Some(1000.0));
        assert_eq!(rows[1].altair_flag, "Altair");
    }
}
