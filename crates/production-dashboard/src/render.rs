//! Terminal and JSON presentation of a dashboard run.

use std::fmt;

use production_core::formatting::{format_number, format_optional, format_quantity, format_share, percentage};
use production_core::models::{IngestionReport, KeyValue};
use production_data::aggregator::Aggregation;
use production_data::analysis::DashboardReport;
use production_data::kpi::SectorKpiTable;
use production_data::twin::PointKind;
use serde::Serialize;

/// Trailing moving-average points shown in the text report.
const MOVING_AVERAGE_TAIL: usize = 7;

/// Everything a run produces, serialized as-is for `--format json`.
#[derive(Debug, Serialize)]
pub struct RunOutput<'a> {
    pub source: String,
    pub profile: &'a str,
    pub ingestion: &'a IngestionReport,
    pub dashboard: &'a DashboardReport,
    pub sector_kpis: &'a [SectorKpiTable],
}

impl RunOutput<'_> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn key_label(key: &[KeyValue]) -> String {
    if key.is_empty() {
        return "-".to_string();
    }
    key.iter().map(KeyValue::to_string).collect::<Vec<_>>().join(" / ")
}

fn write_section(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "── {} ──", title)
}

fn write_aggregation(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    aggregation: &Aggregation,
    decimals: u32,
) -> fmt::Result {
    write_section(f, title)?;
    if aggregation.is_empty() {
        return writeln!(f, "  (no data)");
    }
    for row in &aggregation.rows {
        writeln!(
            f,
            "  {:<28} {:>14}",
            key_label(&row.key),
            format_number(row.value, decimals)
        )?;
    }
    Ok(())
}

impl fmt::Display for RunOutput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.dashboard;
        writeln!(f, "Production dashboard  {}", report.generated_at)?;
        writeln!(f, "Source: {}  (profile: {})", self.source, self.profile)?;

        write_section(f, "Ingestion")?;
        writeln!(
            f,
            "  read {}  malformed {}  rejected {}  retained {}",
            self.ingestion.rows_read,
            self.ingestion.rows_malformed,
            self.ingestion.rows_rejected,
            self.ingestion.rows_retained
        )?;

        let summary = &report.summary;
        write_section(f, "Summary")?;
        let share = percentage(report.records_filtered as f64, report.records_total as f64, 1);
        writeln!(
            f,
            "  records        {} of {} ({})",
            report.records_filtered,
            report.records_total,
            share.map_or_else(|| "n/a".to_string(), format_share)
        )?;
        writeln!(f, "  total quantity {}", format_quantity(summary.total_quantity))?;
        writeln!(f, "  mean quantity  {}", format_optional(summary.mean_quantity, 2))?;
        writeln!(f, "  max quantity   {}", format_optional(summary.max_quantity, 0))?;
        writeln!(
            f,
            "  top category   {}",
            summary.top_category.as_deref().unwrap_or("n/a")
        )?;
        if let Some(b) = &report.distribution.box_summary {
            writeln!(
                f,
                "  quantity box   min {}  q1 {}  median {}  q3 {}  max {}",
                format_number(b.min, 1),
                format_number(b.q1, 1),
                format_number(b.median, 1),
                format_number(b.q3, 1),
                format_number(b.max, 1)
            )?;
        }

        write_aggregation(f, "Production by month", &report.production_by_month_year, 0)?;
        write_aggregation(f, "Production by team", &report.production_by_team, 0)?;
        write_aggregation(f, "Mean quantity by category", &report.mean_by_category, 2)?;
        write_aggregation(f, "Orders by channel", &report.orders_by_channel, 0)?;
        write_aggregation(f, "Weighted production by family", &report.weighted_by_family, 0)?;
        write_aggregation(f, "Top categories", &report.top_categories, 0)?;

        write_section(f, "Pareto by responsible")?;
        if report.pareto_by_responsible.is_empty() {
            writeln!(f, "  (no data)")?;
        }
        for row in &report.pareto_by_responsible {
            writeln!(
                f,
                "  {:<28} {:>14} {:>8} {:>8}",
                key_label(&row.key),
                format_quantity(row.value),
                format_share(row.share),
                format_share(row.cumulative_share)
            )?;
        }

        write_section(f, "Daily moving average")?;
        let tail = report.moving_average.len().saturating_sub(MOVING_AVERAGE_TAIL);
        if report.moving_average.is_empty() {
            writeln!(f, "  (no data)")?;
        }
        for point in &report.moving_average[tail..] {
            writeln!(
                f,
                "  {}  total {:>12}  average {:>12}",
                point.date,
                format_quantity(point.total),
                format_optional(point.average, 1)
            )?;
        }

        write_section(f, "Anomalies")?;
        if report.anomalies.is_empty() {
            writeln!(f, "  none")?;
        }
        for anomaly in &report.anomalies {
            writeln!(
                f,
                "  row {:<6} {:<12} {}  value {}  z {}",
                anomaly.row_number,
                anomaly.id.as_deref().unwrap_or("-"),
                anomaly.delivery_date,
                format_quantity(anomaly.value),
                format_number(anomaly.z_score, 2)
            )?;
        }

        let projection = &report.projection;
        write_section(f, "Projection")?;
        writeln!(
            f,
            "  SDOR base {}  shift {}  headcount {}  working days {}",
            format_number(projection.input.sdor_base, 2),
            projection.input.shift.as_str(),
            format_number(projection.input.headcount, 0),
            format_number(projection.input.working_days, 0)
        )?;
        writeln!(
            f,
            "  projected monthly production {}",
            format_quantity(projection.monthly_projection)
        )?;
        for point in projection.series.iter().filter(|p| p.kind == PointKind::Projected) {
            writeln!(f, "  {}  {:>14}", point.month, format_quantity(point.quantity))?;
        }

        for sector in self.sector_kpis {
            write_section(f, &format!("Sector KPIs: {}", sector.sector))?;
            for series in &sector.metrics {
                let latest = series.points.iter().rev().find_map(|p| p.value.map(|v| (&p.month, v)));
                match latest {
                    Some((month, value)) => writeln!(
                        f,
                        "  {:<28} {:>12}  ({})",
                        series.metric,
                        format_number(value, 2),
                        month
                    )?,
                    None => writeln!(f, "  {:<28} {:>12}", series.metric, "n/a")?,
                }
            }
        }
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
