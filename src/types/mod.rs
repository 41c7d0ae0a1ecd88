//! Shared data structures for the PM Flex pipeline
//!
//! Records flow strictly one way through these types:
//! - Bronze: `PmEvent` (raw maintenance transaction)
//! - Silver: `ClassifiedEvent` (event + derived classifications),
//!   `EntityAggregate` → `ChronicScoreRecord`, `DowntimeSummaryRow`
//! - Gold: `SiteKpiRow`, `CeidKpiRow`, `PartReplacementRow`, `ChronicHistoryRow`

mod event;
mod classified;
mod chronic;
mod kpi;
mod run;

pub use event::*;
pub use run::*;
pub use classified::*;
pub use chronic::*;
pub use kpi::*;
