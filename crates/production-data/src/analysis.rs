//! Main pipeline for the production dashboard.
//!
//! Loads and normalizes the work-order source, then assembles every named
//! aggregation and derived analysis over the filtered view into a
//! [`DashboardReport`] ready for the presentation layer.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use production_core::error::Result;
use production_core::models::{
    CapacityLogEntry, Dimension, FilterCriteria, IngestionReport, NormalizedTable, ShiftPattern,
    ValueColumn,
};
use production_core::profile::IngestionProfile;
use production_core::stats::{histogram, mean, BoxSummary, HistogramBin};
use serde::Serialize;
use tracing::info;

use crate::aggregator::{Aggregation, Aggregator, GroupBy, Measure, TimeKey};
use crate::analyzer::{pareto, Anomaly, MovingAveragePoint, ParetoRow, SeriesAnalyzer};
use crate::filter::{apply_filters, FilterOptions};
use crate::normalize::normalize;
use crate::reader::{load_raw_table, SourceLocation};
use crate::twin::{project_production, ProjectionRequest, ProjectionSummary};

/// Number of histogram bins in the quantity distribution.
pub const HISTOGRAM_BINS: usize = 30;

// ── Public types ──────────────────────────────────────────────────────────────

/// Tunables of [`build_dashboard`].
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardOptions {
    /// Value column of the rankings, the moving average and anomaly flags.
    pub value_column: ValueColumn,
    pub top_n: usize,
    pub window: usize,
    pub z_threshold: f64,
    pub histogram_bins: usize,
    pub projection: ProjectionRequest,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            value_column: ValueColumn::Quantity,
            top_n: 5,
            window: 7,
            z_threshold: 3.0,
            histogram_bins: HISTOGRAM_BINS,
            projection: ProjectionRequest {
                shift: ShiftPattern::Single,
                headcount: 10.0,
                working_days: 22.0,
                horizon: 6,
            },
        }
    }
}

/// Headline figures of the filtered view. Every measure is `None` when the
/// view is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub record_count: usize,
    pub total_quantity: f64,
    pub mean_quantity: Option<f64>,
    pub max_quantity: Option<f64>,
    /// Most frequent category; ties go to the smallest name.
    pub top_category: Option<String>,
}

/// Quantity distribution backing the histogram and box plot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub histogram: Vec<HistogramBin>,
    pub box_summary: Option<BoxSummary>,
}

/// Everything the dashboard renders for one set of filter selections.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    /// RFC 3339 timestamp of this computation.
    pub generated_at: String,
    pub criteria: FilterCriteria,
    /// Option lists computed from the unfiltered table.
    pub filter_options: FilterOptions,
    pub records_total: usize,
    pub records_filtered: usize,
    pub summary: SummaryMetrics,
    pub distribution: Distribution,
    pub production_by_month: Aggregation,
    pub production_by_month_year: Aggregation,
    pub evolution_by_responsible: Aggregation,
    pub production_by_team: Aggregation,
    pub mean_by_category: Aggregation,
    pub orders_by_channel: Aggregation,
    pub cumulative_by_team: Aggregation,
    pub weighted_by_family: Aggregation,
    pub top_categories: Aggregation,
    pub pareto_by_responsible: Vec<ParetoRow>,
    pub moving_average: Vec<MovingAveragePoint>,
    pub anomalies: Vec<Anomaly>,
    pub projection: ProjectionSummary,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Fetch, read and normalize the work-order source.
///
/// Any fetch or schema failure aborts; no partial table is returned.
pub fn load_work_orders(
    location: &SourceLocation,
    profile: &IngestionProfile,
    timeout: Duration,
) -> Result<(NormalizedTable, IngestionReport)> {
    let load_start = Instant::now();
    let raw = load_raw_table(location, &profile.header, timeout)?;
    let (table, report) = normalize(&raw, profile)?;
    info!(
        "Loaded {} work orders from {} in {:.3}s ({} malformed, {} rejected)",
        report.rows_retained,
        location,
        load_start.elapsed().as_secs_f64(),
        report.rows_malformed,
        report.rows_rejected
    );
    Ok((table, report))
}

/// Filter `table` by `criteria` and compute the full dashboard.
///
/// `capacity_log` feeds the projection; when absent the fallback SDOR is used.
pub fn build_dashboard(
    table: &NormalizedTable,
    criteria: &FilterCriteria,
    options: &DashboardOptions,
    capacity_log: Option<&[CapacityLogEntry]>,
) -> DashboardReport {
    let start = Instant::now();
    let filtered = apply_filters(table, criteria);
    let value = options.value_column;

    let sum = |group_by: GroupBy, column: ValueColumn| {
        Aggregator::aggregate(&filtered, group_by, column, Measure::Sum)
    };

    let by_category = sum(GroupBy::One(Dimension::Category), value);
    let by_responsible = sum(GroupBy::One(Dimension::Responsible), value);
    let analyzer = SeriesAnalyzer::new(options.window, options.z_threshold);

    let report = DashboardReport {
        generated_at: Utc::now().to_rfc3339(),
        criteria: criteria.clone(),
        filter_options: FilterOptions::from_table(table),
        records_total: table.len(),
        records_filtered: filtered.len(),
        summary: summary_metrics(&filtered),
        distribution: distribution(&filtered, options.histogram_bins),
        production_by_month: sum(GroupBy::One(Dimension::Month), ValueColumn::Quantity),
        production_by_month_year: sum(GroupBy::One(Dimension::MonthYear), ValueColumn::Quantity),
        evolution_by_responsible: sum(
            GroupBy::Two(Dimension::MonthYear, Dimension::Responsible),
            ValueColumn::Quantity,
        ),
        production_by_team: sum(GroupBy::One(Dimension::Team), ValueColumn::Quantity),
        mean_by_category: Aggregator::aggregate(
            &filtered,
            GroupBy::One(Dimension::Category),
            ValueColumn::Quantity,
            Measure::Mean,
        ),
        orders_by_channel: Aggregator::aggregate(
            &filtered,
            GroupBy::One(Dimension::Channel),
            ValueColumn::Quantity,
            Measure::Count,
        ),
        cumulative_by_team: Aggregator::aggregate(
            &filtered,
            GroupBy::One(Dimension::Team),
            ValueColumn::Quantity,
            Measure::CumulativeSum {
                over: TimeKey::MonthYear,
            },
        ),
        weighted_by_family: sum(GroupBy::One(Dimension::Family), ValueColumn::WeightedQuantity),
        top_categories: Aggregator::top_n(&by_category, options.top_n),
        pareto_by_responsible: pareto(&by_responsible),
        moving_average: analyzer.moving_average(&filtered, value),
        anomalies: analyzer.flag_anomalies(&filtered, value),
        projection: project_production(&filtered, capacity_log, &options.projection),
    };

    info!(
        "Dashboard built over {} of {} records in {:.3}s",
        report.records_filtered,
        report.records_total,
        start.elapsed().as_secs_f64()
    );
    report
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn summary_metrics(table: &NormalizedTable) -> SummaryMetrics {
    let quantities: Vec<f64> = table.iter().map(|r| r.quantity).collect();

    let mut category_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for category in table.iter().filter_map(|r| r.category.as_deref()) {
        *category_counts.entry(category).or_insert(0) += 1;
    }
    // Name order, replaced only on a strictly higher count.
    let top_category = category_counts
        .into_iter()
        .fold(None::<(&str, usize)>, |best, (name, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((name, count)),
        })
        .map(|(name, _)| name.to_string());

    SummaryMetrics {
        record_count: quantities.len(),
        total_quantity: quantities.iter().sum(),
        mean_quantity: mean(&quantities),
        max_quantity: quantities.iter().copied().reduce(f64::max),
        top_category,
    }
}

fn distribution(table: &NormalizedTable, bins: usize) -> Distribution {
    let quantities: Vec<f64> = table.iter().map(|r| r.quantity).collect();
    Distribution {
        histogram: histogram(&quantities, bins),
        box_summary: BoxSummary::from_values(&quantities),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
