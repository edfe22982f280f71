//! Group-by aggregation over normalized work orders.
//!
//! Groups are keyed by one or two [`Dimension`]s and held in a `BTreeMap`, so
//! every result comes out in ascending key order.

use std::collections::BTreeMap;

use production_core::models::{Dimension, KeyValue, NormalizedTable, ValueColumn, WorkOrderRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── Request types ─────────────────────────────────────────────────────────────

/// Grouping key of an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    One(Dimension),
    Two(Dimension, Dimension),
}

impl GroupBy {
    pub fn dimensions(&self) -> Vec<Dimension> {
        match *self {
            GroupBy::One(d) => vec![d],
            GroupBy::Two(a, b) => vec![a, b],
        }
    }
}

/// Time axis a cumulative sum runs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeKey {
    MonthYear,
    Date,
}

impl TimeKey {
    pub fn dimension(&self) -> Dimension {
        match self {
            TimeKey::MonthYear => Dimension::MonthYear,
            TimeKey::Date => Dimension::Date,
        }
    }
}

/// Reduction applied to each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Sum,
    Mean,
    Count,
    /// Running total within each group, accumulated in time order.
    CumulativeSum { over: TimeKey },
}

// ── Result types ──────────────────────────────────────────────────────────────

/// One `(key tuple, value)` row of an aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub key: Vec<KeyValue>,
    pub value: f64,
}

/// An ordered aggregation result. Empty input yields an empty `rows`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    /// Names of the key components, in key order.
    pub dimensions: Vec<Dimension>,
    pub value_column: ValueColumn,
    pub measure: Measure,
    pub rows: Vec<AggregateRow>,
}

impl Aggregation {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of every row's value.
    pub fn total(&self) -> f64 {
        self.rows.iter().map(|r| r.value).sum()
    }
}

// ── Aggregator ────────────────────────────────────────────────────────────────

/// Stateless group-by engine.
pub struct Aggregator;

impl Aggregator {
    /// Group `table` by `group_by` and reduce `value` with `measure`.
    ///
    /// Records lacking any key component or the value are skipped. For a
    /// cumulative sum the groups are the non-time dimensions of `group_by`,
    /// the time key is appended as the last key component, and each group's
    /// totals are accumulated in ascending time order.
    pub fn aggregate(
        table: &NormalizedTable,
        group_by: GroupBy,
        value: ValueColumn,
        measure: Measure,
    ) -> Aggregation {
        let dimensions = match measure {
            Measure::CumulativeSum { over } => {
                let time = over.dimension();
                let mut dims: Vec<Dimension> = group_by
                    .dimensions()
                    .into_iter()
                    .filter(|d| *d != time)
                    .collect();
                dims.push(time);
                dims
            }
            _ => group_by.dimensions(),
        };

        let mut groups: BTreeMap<Vec<KeyValue>, GroupStats> = BTreeMap::new();
        let mut skipped = 0usize;
        for record in table.iter() {
            match (key_of(record, &dimensions), record.value(value)) {
                (Some(key), Some(v)) => groups.entry(key).or_default().add(v),
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!(
                "aggregate {:?}: skipped {} records without key or value",
                dimensions, skipped
            );
        }

        let rows = match measure {
            Measure::Sum => collect(groups, |g| g.sum),
            Measure::Count => collect(groups, |g| g.count as f64),
            Measure::Mean => collect(groups, |g| g.sum / g.count as f64),
            Measure::CumulativeSum { .. } => cumulate(groups),
        };

        Aggregation {
            dimensions,
            value_column: value,
            measure,
            rows,
        }
    }

    /// The `n` largest rows of `aggregation`, returned ascending by value.
    ///
    /// Equal values keep ascending key order, both when choosing and in the
    /// returned order.
    pub fn top_n(aggregation: &Aggregation, n: usize) -> Aggregation {
        let mut rows = aggregation.rows.clone();
        rows.sort_by(|a, b| b.value.total_cmp(&a.value));
        rows.truncate(n);
        rows.sort_by(|a, b| a.value.total_cmp(&b.value).then_with(|| a.key.cmp(&b.key)));
        Aggregation {
            rows,
            ..aggregation.clone()
        }
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

#[derive(Default)]
struct GroupStats {
    sum: f64,
    count: usize,
}

impl GroupStats {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }
}

fn key_of(record: &WorkOrderRecord, dimensions: &[Dimension]) -> Option<Vec<KeyValue>> {
    dimensions.iter().map(|d| d.key(record)).collect()
}

fn collect(
    groups: BTreeMap<Vec<KeyValue>, GroupStats>,
    reduce: impl Fn(&GroupStats) -> f64,
) -> Vec<AggregateRow> {
    groups
        .into_iter()
        .map(|(key, stats)| AggregateRow {
            value: reduce(&stats),
            key,
        })
        .collect()
}

/// Running totals per partition. The last key component is the time key;
/// BTreeMap order groups each partition's rows together in time order.
fn cumulate(groups: BTreeMap<Vec<KeyValue>, GroupStats>) -> Vec<AggregateRow> {
    let mut rows = Vec::with_capacity(groups.len());
    let mut partition: Option<Vec<KeyValue>> = None;
    let mut running = 0.0;

    for (key, stats) in groups {
        let prefix = &key[..key.len() - 1];
        if partition.as_deref() != Some(prefix) {
            partition = Some(prefix.to_vec());
            running = 0.0;
        }
        running += stats.sum;
        rows.push(AggregateRow { key, value: running });
    }
    rows
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use chrono::{Datelike, NaiveDate};
    use production_core::models::RawTable;
    use production_core::profile::IngestionProfile;

    fn record(team: &str, category: Option<&str>, qty: f64, date: (i32, u32, u32)) -> WorkOrderRecord {
        let delivery_date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        WorkOrderRecord {
            row_number: 0,
            id: None,
            team: team.to_string(),
            responsible: "ANA".to_string(),
            channel: None,
            status: None,
            product_code: None,
            family: None,
            category: category.map(str::to_string),
            quantity: qty,
            weighted_quantity: None,
            delivery_date,
            year: delivery_date.year(),
            month: delivery_date.month(),
            month_year: production_core::time_utils::month_key(delivery_date),
        }
    }

    fn text(s: &str) -> KeyValue {
        KeyValue::Text(s.to_string())
    }

    fn sample() -> NormalizedTable {
        NormalizedTable::new(vec![
            record("B", Some("BOX"), 5.0, (2024, 2, 1)),
            record("A", Some("BOX"), 10.0, (2024, 1, 5)),
            record("A", Some("BAG"), 30.0, (2024, 3, 7)),
            record("B", None, 15.0, (2024, 1, 9)),
            record("A", Some("BOX"), 20.0, (2024, 2, 3)),
        ])
    }

    // ── Sum / Mean / Count ───────────────────────────────────────────────────

    #[test]
    fn test_team_sum_after_normalization() {
        let raw = RawTable {
            headers: ["team", "responsible", "quantity", "delivery_date"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows: vec![
                vec!["A".into(), "ANA".into(), "10".into(), "2024-01-05".into()],
                vec!["A".into(), "ANA".into(), "-5".into(), "2024-01-06".into()],
                vec!["B".into(), "ANA".into(), "20".into(), "2024-01-05".into()],
            ],
            malformed_rows: 0,
        };
        let (table, _) = normalize(&raw, &IngestionProfile::headered()).unwrap();
        let agg = Aggregator::aggregate(
            &table,
            GroupBy::One(Dimension::Team),
            ValueColumn::Quantity,
            Measure::Sum,
        );
        assert_eq!(
            agg.rows,
            vec![
                AggregateRow { key: vec![text("A")], value: 10.0 },
                AggregateRow { key: vec![text("B")], value: 20.0 },
            ]
        );
    }

    #[test]
    fn test_sum_conserves_total() {
        let table = sample();
        let expected: f64 = table.iter().map(|r| r.quantity).sum();
        for group_by in [
            GroupBy::One(Dimension::Team),
            GroupBy::One(Dimension::Month),
            GroupBy::Two(Dimension::MonthYear, Dimension::Team),
        ] {
            let agg = Aggregator::aggregate(&table, group_by, ValueColumn::Quantity, Measure::Sum);
            assert!((agg.total() - expected).abs() < 1e-9, "{group_by:?}");
        }
    }

    #[test]
    fn test_missing_key_is_skipped() {
        let agg = Aggregator::aggregate(
            &sample(),
            GroupBy::One(Dimension::Category),
            ValueColumn::Quantity,
            Measure::Sum,
        );
        assert_eq!(agg.len(), 2);
        assert_eq!(agg.total(), 65.0);
    }

    #[test]
    fn test_missing_value_is_skipped() {
        let mut table = sample();
        table.records[0].weighted_quantity = Some(2.5);
        let agg = Aggregator::aggregate(
            &table,
            GroupBy::One(Dimension::Team),
            ValueColumn::WeightedQuantity,
            Measure::Count,
        );
        assert_eq!(agg.rows, vec![AggregateRow { key: vec![text("B")], value: 1.0 }]);
    }

    #[test]
    fn test_mean_and_count() {
        let mean = Aggregator::aggregate(
            &sample(),
            GroupBy::One(Dimension::Team),
            ValueColumn::Quantity,
            Measure::Mean,
        );
        assert_eq!(mean.rows[0].value, 20.0);
        assert_eq!(mean.rows[1].value, 10.0);

        let count = Aggregator::aggregate(
            &sample(),
            GroupBy::One(Dimension::Team),
            ValueColumn::Quantity,
            Measure::Count,
        );
        assert_eq!(count.rows[0].value, 3.0);
        assert_eq!(count.rows[1].value, 2.0);
    }

    #[test]
    fn test_two_key_grouping_ordered_by_key() {
        let agg = Aggregator::aggregate(
            &sample(),
            GroupBy::Two(Dimension::MonthYear, Dimension::Team),
            ValueColumn::Quantity,
            Measure::Sum,
        );
        let keys: Vec<String> = agg
            .rows
            .iter()
            .map(|r| format!("{}/{}", r.key[0], r.key[1]))
            .collect();
        assert_eq!(
            keys,
            vec!["2024-01/A", "2024-01/B", "2024-02/A", "2024-02/B", "2024-03/A"]
        );
        assert_eq!(agg.dimensions, vec![Dimension::MonthYear, Dimension::Team]);
    }

    #[test]
    fn test_empty_table_gives_empty_result() {
        let agg = Aggregator::aggregate(
            &NormalizedTable::default(),
            GroupBy::One(Dimension::Team),
            ValueColumn::Quantity,
            Measure::Mean,
        );
        assert!(agg.is_empty());
    }

    // ── Cumulative sum ───────────────────────────────────────────────────────

    #[test]
    fn test_cumulative_sum_in_time_order_per_group() {
        let agg = Aggregator::aggregate(
            &sample(),
            GroupBy::One(Dimension::Team),
            ValueColumn::Quantity,
            Measure::CumulativeSum { over: TimeKey::MonthYear },
        );
        assert_eq!(agg.dimensions, vec![Dimension::Team, Dimension::MonthYear]);
        let values: Vec<(String, f64)> = agg
            .rows
            .iter()
            .map(|r| (format!("{}/{}", r.key[0], r.key[1]), r.value))
            .collect();
        assert_eq!(
            values,
            vec![
                ("A/2024-01".to_string(), 10.0),
                ("A/2024-02".to_string(), 30.0),
                ("A/2024-03".to_string(), 60.0),
                ("B/2024-01".to_string(), 15.0),
                ("B/2024-02".to_string(), 20.0),
            ]
        );
    }

    #[test]
    fn test_cumulative_sum_over_date_without_partition() {
        let agg = Aggregator::aggregate(
            &sample(),
            GroupBy::One(Dimension::Date),
            ValueColumn::Quantity,
            Measure::CumulativeSum { over: TimeKey::Date },
        );
        assert_eq!(agg.dimensions, vec![Dimension::Date]);
        let values: Vec<f64> = agg.rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![10.0, 25.0, 30.0, 50.0, 80.0]);
    }

    // ── Top-N ────────────────────────────────────────────────────────────────

    #[test]
    fn test_top_n_fewer_keys_than_n() {
        let agg = Aggregator::aggregate(
            &sample(),
            GroupBy::One(Dimension::Month),
            ValueColumn::Quantity,
            Measure::Sum,
        );
        let top = Aggregator::top_n(&agg, 5);
        assert_eq!(top.len(), 3);
        let values: Vec<f64> = top.rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![25.0, 25.0, 30.0]);
        // Tie between January and February keeps key order.
        assert_eq!(top.rows[0].key, vec![KeyValue::Int(1)]);
    }

    #[test]
    fn test_top_n_selects_largest_with_key_tie_break() {
        let table = NormalizedTable::new(vec![
            record("A", Some("W"), 5.0, (2024, 1, 1)),
            record("A", Some("X"), 9.0, (2024, 1, 1)),
            record("A", Some("Y"), 5.0, (2024, 1, 1)),
            record("A", Some("Z"), 1.0, (2024, 1, 1)),
        ]);
        let agg = Aggregator::aggregate(
            &table,
            GroupBy::One(Dimension::Category),
            ValueColumn::Quantity,
            Measure::Sum,
        );
        let top = Aggregator::top_n(&agg, 2);
        let keys: Vec<String> = top.rows.iter().map(|r| r.key[0].to_string()).collect();
        assert_eq!(keys, vec!["W", "X"]);
    }
}
