//! Derived analyses on top of the filtered table: Pareto ranking, the daily
//! moving average and z-score anomaly flags.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use production_core::models::{KeyValue, NormalizedTable, ValueColumn};
use production_core::stats::{mean, z_scores, Z_SCORE_EPSILON};
use serde::Serialize;
use tracing::debug;

use crate::aggregator::Aggregation;

// ── Result types ──────────────────────────────────────────────────────────────

/// One group of a Pareto ranking. Shares are percentages of the total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParetoRow {
    pub key: Vec<KeyValue>,
    pub value: f64,
    pub share: f64,
    pub cumulative_share: f64,
}

/// Total of the value column for one delivery date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: f64,
}

/// One point of the trailing moving average. `average` is `None` until the
/// window has filled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovingAveragePoint {
    pub date: NaiveDate,
    pub total: f64,
    pub average: Option<f64>,
}

/// A work order whose value lies beyond the z-score threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub row_number: usize,
    pub id: Option<String>,
    pub delivery_date: NaiveDate,
    pub value: f64,
    pub z_score: f64,
}

// ── Pareto ────────────────────────────────────────────────────────────────────

/// Rank `aggregation` descending by value with running cumulative share.
///
/// Equal values keep ascending key order. A non-positive total yields an
/// empty ranking.
pub fn pareto(aggregation: &Aggregation) -> Vec<ParetoRow> {
    let total = aggregation.total();
    if total <= 0.0 || !total.is_finite() {
        debug!("pareto: total is {}, returning empty ranking", total);
        return Vec::new();
    }

    let mut rows = aggregation.rows.clone();
    rows.sort_by(|a, b| b.value.total_cmp(&a.value));

    let mut running = 0.0;
    rows.into_iter()
        .map(|row| {
            running += row.value;
            ParetoRow {
                share: row.value / total * 100.0,
                cumulative_share: running / total * 100.0,
                key: row.key,
                value: row.value,
            }
        })
        .collect()
}

// ── SeriesAnalyzer ────────────────────────────────────────────────────────────

/// Time-series and outlier analyses over a table's value column.
#[derive(Debug, Clone)]
pub struct SeriesAnalyzer {
    window: usize,
    z_threshold: f64,
    epsilon: f64,
}

impl Default for SeriesAnalyzer {
    fn default() -> Self {
        Self::new(7, 3.0)
    }
}

impl SeriesAnalyzer {
    /// `window` is clamped to at least one day.
    pub fn new(window: usize, z_threshold: f64) -> Self {
        Self {
            window: window.max(1),
            z_threshold,
            epsilon: Z_SCORE_EPSILON,
        }
    }

    /// Per-date totals in chronological order. Dates without orders are not
    /// filled in.
    pub fn daily_totals(table: &NormalizedTable, value: ValueColumn) -> Vec<DailyTotal> {
        let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for record in table.iter() {
            if let Some(v) = record.value(value) {
                *by_date.entry(record.delivery_date).or_insert(0.0) += v;
            }
        }
        by_date
            .into_iter()
            .map(|(date, total)| DailyTotal { date, total })
            .collect()
    }

    /// Trailing moving average over the daily totals of `table`.
    pub fn moving_average(&self, table: &NormalizedTable, value: ValueColumn) -> Vec<MovingAveragePoint> {
        self.moving_average_of(&Self::daily_totals(table, value))
    }

    /// Trailing moving average over an already-built daily series.
    ///
    /// The first `window - 1` points have no average.
    pub fn moving_average_of(&self, daily: &[DailyTotal]) -> Vec<MovingAveragePoint> {
        let totals: Vec<f64> = daily.iter().map(|d| d.total).collect();
        daily
            .iter()
            .enumerate()
            .map(|(i, point)| MovingAveragePoint {
                date: point.date,
                total: point.total,
                average: if i + 1 >= self.window {
                    mean(&totals[i + 1 - self.window..=i])
                } else {
                    None
                },
            })
            .collect()
    }

    /// Indices and z-scores of `values` whose |z| exceeds the threshold.
    pub fn outliers(&self, values: &[f64]) -> Vec<(usize, f64)> {
        z_scores(values, self.epsilon)
            .into_iter()
            .enumerate()
            .filter(|(_, z)| z.abs() > self.z_threshold)
            .collect()
    }

    /// Work orders whose `value` is a z-score outlier among the table's rows.
    ///
    /// Rows without the value column do not take part.
    pub fn flag_anomalies(&self, table: &NormalizedTable, value: ValueColumn) -> Vec<Anomaly> {
        let measured: Vec<_> = table
            .iter()
            .filter_map(|r| r.value(value).map(|v| (r, v)))
            .collect();
        let values: Vec<f64> = measured.iter().map(|(_, v)| *v).collect();

        let anomalies: Vec<Anomaly> = self
            .outliers(&values)
            .into_iter()
            .map(|(idx, z_score)| {
                let (record, value) = measured[idx];
                Anomaly {
                    row_number: record.row_number,
                    id: record.id.clone(),
                    delivery_date: record.delivery_date,
                    value,
                    z_score,
                }
            })
            .collect();

        debug!(
            "flag_anomalies: {} of {} values beyond |z| > {}",
            anomalies.len(),
            values.len(),
            self.z_threshold
        );
        anomalies
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
