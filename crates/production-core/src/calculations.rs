use serde::{Deserialize, Serialize};

use crate::models::{CapacityLogEntry, ShiftPattern};

/// SDOR used when no capacity log is available at all.
pub const FALLBACK_SDOR: f64 = 50.0;

/// Number of most recent months averaged into the SDOR base.
pub const SDOR_TRAILING_MONTHS: usize = 3;

/// Interface for any monthly capacity record from which a standard output
/// per resource-day can be read or derived.
pub trait CapacityRecord {
    /// Explicit SDOR, if the record carries one.
    fn reported_sdor(&self) -> Option<f64>;
    /// Realized production for the period.
    fn production(&self) -> f64;
    /// Number of people working the period.
    fn headcount(&self) -> f64;
    /// Number of working days in the period.
    fn working_days(&self) -> f64;
}

impl CapacityRecord for CapacityLogEntry {
    fn reported_sdor(&self) -> Option<f64> {
        self.sdor
    }

    fn production(&self) -> f64 {
        self.production
    }

    fn headcount(&self) -> f64 {
        self.headcount
    }

    fn working_days(&self) -> f64 {
        self.working_days
    }
}

/// Inputs of a single production projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionInput {
    pub sdor_base: f64,
    pub shift: ShiftPattern,
    pub headcount: f64,
    pub working_days: f64,
}

// ── ProductionProjector ───────────────────────────────────────────────────────

/// Stateless collection of digital-twin capacity calculations.
pub struct ProductionProjector;

impl ProductionProjector {
    /// `production / (headcount × working_days)`.
    ///
    /// Returns `None` when the denominator is zero or negative.
    pub fn derive_sdor(production: f64, headcount: f64, working_days: f64) -> Option<f64> {
        let resource_days = headcount * working_days;
        if resource_days <= 0.0 || !resource_days.is_finite() {
            return None;
        }
        Some(production / resource_days)
    }

    /// The SDOR of a record: its reported value, else derived from
    /// production and resources.
    pub fn sdor_of<R: CapacityRecord>(record: &R) -> Option<f64> {
        record.reported_sdor().or_else(|| {
            Self::derive_sdor(record.production(), record.headcount(), record.working_days())
        })
    }

    /// Baseline productivity for projections.
    ///
    /// `log` must be ordered oldest → newest. Records whose SDOR is undefined
    /// are skipped. The result is:
    /// * the mean of the last [`SDOR_TRAILING_MONTHS`] defined values, or
    /// * the latest defined value when fewer exist, or
    /// * [`FALLBACK_SDOR`] when the log is absent or has no defined values.
    pub fn sdor_base<R: CapacityRecord>(log: Option<&[R]>) -> f64 {
        let defined: Vec<f64> = log
            .unwrap_or_default()
            .iter()
            .filter_map(Self::sdor_of)
            .collect();

        match defined.len() {
            0 => FALLBACK_SDOR,
            n if n < SDOR_TRAILING_MONTHS => defined[n - 1],
            n => {
                let tail = &defined[n - SDOR_TRAILING_MONTHS..];
                tail.iter().sum::<f64>() / tail.len() as f64
            }
        }
    }

    /// `SDOR_base × shift factor × headcount × working days`.
    pub fn project(input: &ProjectionInput) -> f64 {
        input.sdor_base * input.shift.factor() * input.headcount * input.working_days
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
