//! Tool-population flags from a side file.
//!
//! The PM Flex export may not carry `AltairFlag`. A two-column CSV
//! (`ENTITY`, `ProcessAllowed`) supplies it per tool; tools absent from the
//! file keep `UNKNOWN`.

use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use super::csv::{csv_split, ColumnMap};
use super::IngestError;
use crate::config::defaults::UNKNOWN_POPULATION_FLAG;
use crate::types::PmEvent;

const COL_TOOL: &str = "ENTITY";
const COL_FLAG: &str = "ProcessAllowed";

/// Tool name → population flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationFlags {
    flags: HashMap<String, String>,
}

impl PopulationFlags {
    pub fn load(path: &Path) -> Result<Self, IngestError> {
        let content = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let flags = Self::parse(&content, &path.display().to_string())?;
        info!(path = %path.display(), tools = flags.len(), "Loaded tool population flags");
        Ok(flags)
    }

    pub fn parse(content: &str, source: &str) -> Result<Self, IngestError> {
        let mut lines = content.lines();
        let header = lines.next().unwrap_or_default();
        let columns = ColumnMap::from_header(header);
        let (Some(tool_idx), Some(flag_idx)) = (columns.get(COL_TOOL), columns.get(COL_FLAG)) else {
            return Err(IngestError::Schema {
                source_name: source.to_string(),
                missing: [COL_TOOL, COL_FLAG]
                    .iter()
                    .filter(|c| columns.get(c).is_none())
                    .map(ToString::to_string)
                    .collect(),
            });
        };

        let mut flags = HashMap::new();
        for line in lines.filter(|l| !l.trim().is_empty()) {
            let fields = csv_split(line);
            let tool = fields.get(tool_idx).map(|s| s.trim()).unwrap_or_default();
            let flag = fields.get(flag_idx).map(|s| s.trim()).unwrap_or_default();
            if tool.is_empty() || flag.is_empty() {
                continue;
            }
            if let Some(previous) = flags.insert(tool.to_string(), flag.to_string()) {
                if previous != flag {
                    warn!(tool, previous = %previous, flag, "Conflicting population flags, keeping the last");
                }
            }
        }
        Ok(Self { flags })
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn get(&self, tool: &str) -> Option<&str> {
        self.flags.get(tool).map(String::as_str)
    }

    /// Fill the flag of events that still carry `UNKNOWN`. Returns how many changed.
    pub fn apply(&self, events: &mut [PmEvent]) -> usize {
        let mut tagged = 0;
        for event in events.iter_mut() {
            if event.altair_flag != UNKNOWN_POPULATION_FLAG {
                continue;
            }
            if let Some(flag) = event.entity.as_deref().and_then(|t| self.get(t)) {
                event.altair_flag = flag.to_string();
                tagged += 1;
            }
        }
        tagged
    }
}
