//! Digital-twin production projection: realized monthly production followed
//! by projected months at the planned capacity.

use production_core::calculations::{ProductionProjector, ProjectionInput};
use production_core::models::{CapacityLogEntry, Dimension, KeyValue, NormalizedTable, ShiftPattern, ValueColumn};
use production_core::time_utils::{add_months, format_month_key, parse_month_key};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregator::{Aggregator, GroupBy, Measure};

/// Planned capacity for the projected months.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRequest {
    pub shift: ShiftPattern,
    pub headcount: f64,
    pub working_days: f64,
    /// Number of months to project.
    pub horizon: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    Historical,
    Projected,
}

/// One month of the merged series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionPoint {
    pub month: String,
    pub quantity: f64,
    pub kind: PointKind,
}

/// Projection inputs, the per-month projected quantity and the merged series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionSummary {
    pub input: ProjectionInput,
    pub monthly_projection: f64,
    pub series: Vec<ProductionPoint>,
}

/// Project production for `request.horizon` months after the latest known month.
///
/// Historical points are the monthly quantity totals of `table`. Projected
/// months follow the last historical month, or the last capacity-log month
/// when the table is empty. With neither, the series holds no projected points.
pub fn project_production(
    table: &NormalizedTable,
    capacity_log: Option<&[CapacityLogEntry]>,
    request: &ProjectionRequest,
) -> ProjectionSummary {
    let input = ProjectionInput {
        sdor_base: ProductionProjector::sdor_base(capacity_log),
        shift: request.shift,
        headcount: request.headcount,
        working_days: request.working_days,
    };
    let monthly_projection = ProductionProjector::project(&input);

    let monthly = Aggregator::aggregate(
        table,
        GroupBy::One(Dimension::MonthYear),
        ValueColumn::Quantity,
        Measure::Sum,
    );
    let mut series: Vec<ProductionPoint> = monthly
        .rows
        .iter()
        .map(|row| ProductionPoint {
            month: row.key.first().map(KeyValue::to_string).unwrap_or_default(),
            quantity: row.value,
            kind: PointKind::Historical,
        })
        .collect();

    let anchor = series
        .last()
        .and_then(|p| parse_month_key(&p.month))
        .or_else(|| capacity_log.and_then(|log| log.last()).map(|e| (e.year, e.month)));

    match anchor {
        Some((year, month)) => {
            series.extend((1..=request.horizon).map(|offset| {
                let (y, m) = add_months(year, month, offset);
                ProductionPoint {
                    month: format_month_key(y, m),
                    quantity: monthly_projection,
                    kind: PointKind::Projected,
                }
            }));
        }
        None => debug!("project_production: no anchor month, projected series left empty"),
    }

    ProjectionSummary {
        input,
        monthly_projection,
        series,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
