//! Capacity log loading.
//!
//! The log is a header-row CSV with one row per month:
//! `month, headcount, working_days, shift_factor, production[, sdor]`.
//! Month keys may be written `YYYY-MM` or `MM/YYYY`.

use std::time::Duration;

use production_core::calculations::ProductionProjector;
use production_core::data_processors::{NumberParser, NumericLocale};
use production_core::error::{PipelineError, Result};
use production_core::models::CapacityLogEntry;
use production_core::profile::HeaderMode;
use production_core::time_utils::parse_month_key;
use tracing::{debug, warn};

use crate::reader::{fetch_bytes, read_table, SourceLocation};

const REQUIRED_COLUMNS: [&str; 4] = ["month", "headcount", "working_days", "production"];

/// Parse a capacity log, oldest month first.
///
/// A missing required column is a schema error. Rows with an unreadable
/// month or number are skipped. A month listed more than once keeps its
/// last row. `shift_factor` defaults to 1.0 when the
/// column is absent; `sdor` is derived when absent or blank.
pub fn parse_capacity_log(bytes: &[u8]) -> Result<Vec<CapacityLogEntry>> {
    let table = read_table(bytes, &HeaderMode::FirstRow)?;
    let column = |name: &str| {
        table
            .headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
    };

    let mut required = [0usize; 4];
    for (slot, name) in required.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = column(name).ok_or_else(|| PipelineError::MissingColumn(name.to_string()))?;
    }
    let [month, headcount, working_days, production] = required;
    let columns = LogColumns {
        month,
        headcount,
        working_days,
        production,
        shift_factor: column("shift_factor"),
        sdor: column("sdor"),
    };

    let mut entries: Vec<CapacityLogEntry> = Vec::with_capacity(table.rows.len());
    for (idx, row) in table.rows.iter().enumerate() {
        match columns.parse_row(row) {
            Some(entry) => entries.push(entry),
            None => warn!("Skipping capacity log row {}: unreadable values", idx + 1),
        }
    }

    // Stable sort, so a repeated month keeps the row written last.
    entries.sort_by_key(|e| (e.year, e.month));
    let before = entries.len();
    entries.dedup_by(|next, kept| {
        let same_month = (next.year, next.month) == (kept.year, kept.month);
        if same_month {
            std::mem::swap(next, kept);
        }
        same_month
    });
    if entries.len() < before {
        warn!("Dropped {} repeated capacity log months", before - entries.len());
    }
    debug!("Loaded {} capacity log months", entries.len());
    Ok(entries)
}

/// Fetch and parse a capacity log.
pub fn load_capacity_log(location: &SourceLocation, timeout: Duration) -> Result<Vec<CapacityLogEntry>> {
    let bytes = fetch_bytes(location, timeout)?;
    parse_capacity_log(&bytes)
}

struct LogColumns {
    month: usize,
    headcount: usize,
    working_days: usize,
    production: usize,
    shift_factor: Option<usize>,
    sdor: Option<usize>,
}

impl LogColumns {
    fn parse_row(&self, row: &[String]) -> Option<CapacityLogEntry> {
        let number = |i: usize| NumberParser::parse(&row[i], NumericLocale::Plain);

        let (year, month) = parse_month_key(&row[self.month])?;
        let headcount = number(self.headcount)?;
        let working_days = number(self.working_days)?;
        let production = number(self.production)?;
        let shift_factor = match self.shift_factor {
            Some(i) => number(i)?,
            None => 1.0,
        };
        let sdor = self
            .sdor
            .and_then(number)
            .or_else(|| ProductionProjector::derive_sdor(production, headcount, working_days));

        Some(CapacityLogEntry {
            year,
            month,
            headcount,
            working_days,
            shift_factor,
            production,
            sdor,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
