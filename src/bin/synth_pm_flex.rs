//! Synthetic PM Flex export generator
//!
//! Writes a PM Flex CSV for a small fleet over a span of fiscal weeks, with a
//! configurable share of tools behaving chronically (frequent unscheduled PMs,
//! erratic part life, long downtime). Useful for exercising the pipeline
//! end-to-end without a real export.
//!
//! # Usage
//! ```bash
//! ./synth-pm-flex --weeks 8 --seed 7 --out /drops/2025WW22/PM_Flex.csv
//! pm-flex run --csv /drops/2025WW22/PM_Flex.csv
//! ```

use chrono::{Duration, Local, NaiveDate};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use pm_flex::calendar::{FiscalCalendar, IntelCalendar};
use pm_flex::ingest::csv::{
    COL_ALTAIR, COL_ATTRIBUTE_NAME, COL_CEID, COL_CUSTOM_DELTA, COL_DOWNTIME_CLASS, COL_DOWNTIME_SUBCLASS,
    COL_DOWNTIME_TYPE, COL_DOWN_WINDOW_HR, COL_ENTITY, COL_FACILITY, COL_MEDIAN_DELTA, COL_PM_NAME,
    COL_REASON_DEEPDIVE, COL_RECLEAN, COL_SYMPATHY, COL_TXN_DATE, COL_UNIQUE_ENTITY_ID, COL_UTILIZATION,
    COL_YEARWW,
};

// ============================================================================
// Fleet Constants
// ============================================================================

const FACILITIES: [&str; 3] = ["F32", "F28", "D1X"];
const CEIDS: [&str; 3] = ["ETCH01", "DEPO02", "CMP03"];

/// (part, median life in wafers)
const PARTS: [(&str, f64); 4] = [
    ("RF_GENERATOR", 12_000.0),
    ("ESC_CHUCK", 8_000.0),
    ("SHOWERHEAD", 5_000.0),
    ("FOCUS_RING", 3_000.0),
];

const SCHEDULED_REASONS: [&str; 2] = ["Planned PM", "Counter based PM"];
const UNSCHEDULED_REASONS: [&str; 3] = [
    "Particles on monitor wafer, wet clean",
    "Arcing alarm",
    "Pressure drift, \"leak check\" failed",
];

const HEADER: [&str; 19] = [
    COL_ENTITY,
    COL_FACILITY,
    COL_UNIQUE_ENTITY_ID,
    COL_CEID,
    COL_PM_NAME,
    COL_ATTRIBUTE_NAME,
    COL_YEARWW,
    COL_TXN_DATE,
    COL_CUSTOM_DELTA,
    COL_MEDIAN_DELTA,
    COL_DOWN_WINDOW_HR,
    COL_DOWNTIME_TYPE,
    COL_DOWNTIME_CLASS,
    COL_DOWNTIME_SUBCLASS,
    COL_RECLEAN,
    COL_SYMPATHY,
    COL_REASON_DEEPDIVE,
    COL_UTILIZATION,
    COL_ALTAIR,
];

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "synth-pm-flex")]
#[command(about = "Synthetic PM Flex export for pipeline testing")]
#[command(version = "1.0")]
struct Args {
    /// Number of fiscal weeks to generate, ending at --end
    #[arg(short, long, default_value = "8", value_parser = clap::value_parser!(u32).range(1..=104))]
    weeks: u32,

    /// Tools per (facility, chamber)
    #[arg(short, long, default_value = "4", value_parser = clap::value_parser!(u32).range(1..=50))]
    tools: u32,

    /// Share of tools that behave chronically (0.0-1.0)
    #[arg(long, default_value = "0.25")]
    chronic_share: f64,

    /// Last day covered (default: today)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Suppress the summary on stderr
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================================
// Tool Model
// ============================================================================

struct Tool {
    entity: String,
    facility: &'static str,
    ceid: &'static str,
    chronic: bool,
    in_population: bool,
}

impl Tool {
    /// PM events this tool logs in one week.
    fn events_per_week(&self, rng: &mut StdRng) -> u32 {
        if self.chronic {
            rng.gen_range(1..=3)
        } else {
            rng.gen_range(0..=1)
        }
    }

    fn unscheduled_probability(&self) -> f64 {
        if self.chronic {
            0.55
        } else {
            0.08
        }
    }
}

struct Generator {
    rng: StdRng,
    steady_life: Normal<f64>,
    erratic_life: Normal<f64>,
    steady_downtime: Normal<f64>,
    long_downtime: Normal<f64>,
    rows_written: u64,
    unscheduled_written: u64,
}

impl Generator {
    fn new(seed: Option<u64>) -> Result<Self, rand_distr::NormalError> {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            rng,
            steady_life: Normal::new(1.0, 0.08)?,
            erratic_life: Normal::new(0.85, 0.35)?,
            steady_downtime: Normal::new(6.0, 1.5)?,
            long_downtime: Normal::new(11.0, 4.0)?,
            rows_written: 0,
            unscheduled_written: 0,
        })
    }

    fn fleet(&mut self, tools_per_group: u32, chronic_share: f64) -> Vec<Tool> {
        let mut fleet = Vec::new();
        for facility in FACILITIES {
            for ceid in CEIDS {
                for n in 1..=tools_per_group {
                    fleet.push(Tool {
                        entity: format!("{facility}{}_{n:02}", &ceid[..4]),
                        facility,
                        ceid,
                        chronic: self.rng.gen_bool(chronic_share),
                        in_population: self.rng.gen_bool(0.9),
                    });
                }
            }
        }
        fleet
    }

    fn write_week(
        &mut self,
        out: &mut impl Write,
        fleet: &[Tool],
        yearww: &str,
        week_start: NaiveDate,
    ) -> io::Result<()> {
        for tool in fleet {
            for _ in 0..tool.events_per_week(&mut self.rng) {
                let (part, median) = PARTS[self.rng.gen_range(0..PARTS.len())];
                let unscheduled = self.rng.gen_bool(tool.unscheduled_probability());

                let ratio = if tool.chronic {
                    self.erratic_life.sample(&mut self.rng)
                } else {
                    self.steady_life.sample(&mut self.rng)
                }
                .max(0.05);
                let downtime = if tool.chronic {
                    self.long_downtime.sample(&mut self.rng)
                } else {
                    self.steady_downtime.sample(&mut self.rng)
                }
                .max(0.5);

                let txn = week_start
                    + Duration::days(self.rng.gen_range(0..7))
                    + Duration::minutes(self.rng.gen_range(0..24 * 60));
                let reason = if unscheduled {
                    UNSCHEDULED_REASONS[self.rng.gen_range(0..UNSCHEDULED_REASONS.len())]
                } else {
                    SCHEDULED_REASONS[self.rng.gen_range(0..SCHEDULED_REASONS.len())]
                };
                let reclean = unscheduled && self.rng.gen_bool(0.3);
                let sympathy = self.rng.gen_bool(0.05);

                let fields = [
                    tool.entity.clone(),
                    tool.facility.to_string(),
                    format!("{}-{}", tool.facility, tool.entity),
                    tool.ceid.to_string(),
                    format!("{part}_PM"),
                    part.to_string(),
                    yearww.to_string(),
                    txn.format("%Y-%m-%d %H:%M:%S").to_string(),
                    format!("{:.0}", median * ratio),
                    format!("{median:.0}"),
                    format!("{downtime:.2}"),
                    if unscheduled { "Unscheduled" } else { "Scheduled" }.to_string(),
                    if unscheduled { "Repair" } else { "PM" }.to_string(),
                    if unscheduled { "Tool Failure" } else { "Planned" }.to_string(),
                    u8::from(reclean).to_string(),
                    u8::from(sympathy).to_string(),
                    reason.to_string(),
                    format!("{ratio:.3}"),
                    if tool.in_population { "1" } else { "0" }.to_string(),
                ];
                let line: Vec<String> = fields.iter().map(|f| quote(f)).collect();
                writeln!(out, "{}", line.join(","))?;

                self.rows_written += 1;
                if unscheduled {
                    self.unscheduled_written += 1;
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Quote a field when it carries a delimiter or quote.
fn quote(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn log_summary(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    if !(0.0..=1.0).contains(&args.chronic_share) {
        return Err(format!("--chronic-share must be within 0.0-1.0, got {}", args.chronic_share).into());
    }

    let calendar = IntelCalendar::new();
    let end = args.end.unwrap_or_else(|| Local::now().date_naive());
    let last_week = calendar.week_of(end)?;

    let mut generator = Generator::new(args.seed)?;
    let fleet = generator.fleet(args.tools, args.chronic_share);

    let mut out: Box<dyn Write> = match &args.out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Box::new(BufWriter::new(File::create(path)?))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    writeln!(out, "{}", HEADER.join(","))?;

    let first_offset = -i64::from(args.weeks - 1);
    for offset in first_offset..=0 {
        let week = calendar.offset_week(last_week, offset)?;
        let (week_start, _) = calendar.week_range(week)?;
        generator.write_week(&mut out, &fleet, &week.to_string(), week_start)?;
    }
    out.flush()?;
    drop(out);

    let chronic_tools = fleet.iter().filter(|t| t.chronic).count();
    log_summary(&"=".repeat(60), args.quiet);
    log_summary(&format!("Weeks:             {} (through {last_week})", args.weeks), args.quiet);
    log_summary(&format!("Tools:             {} ({chronic_tools} chronic)", fleet.len()), args.quiet);
    log_summary(&format!("PM events:         {}", generator.rows_written), args.quiet);
    log_summary(&format!("Unscheduled:       {}", generator.unscheduled_written), args.quiet);
    if let Some(path) = &args.out {
        log_summary(&format!("Written to:        {}", path.display()), args.quiet);
    }
    log_summary(&"=".repeat(60), args.quiet);

    Ok(())
}
