//! Filter criteria evaluation and the option lists a filter UI offers.

use std::collections::BTreeSet;

use production_core::models::{FilterCriteria, NormalizedTable};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Keep the records every active dimension of `criteria` admits.
///
/// The result is always a subset of `table`, in the original order.
pub fn apply_filters(table: &NormalizedTable, criteria: &FilterCriteria) -> NormalizedTable {
    let records: Vec<_> = table
        .iter()
        .filter(|record| criteria.matches(record))
        .cloned()
        .collect();
    debug!("Filters kept {} of {} records", records.len(), table.len());
    NormalizedTable::new(records)
}

/// Sorted distinct values per filterable dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub years: Vec<i32>,
    pub months: Vec<u32>,
    pub categories: Vec<String>,
    pub responsibles: Vec<String>,
    pub teams: Vec<String>,
    pub channels: Vec<String>,
}

impl FilterOptions {
    /// Collect the options present in `table`. Missing optional values are
    /// not offered.
    pub fn from_table(table: &NormalizedTable) -> Self {
        let mut years = BTreeSet::new();
        let mut months = BTreeSet::new();
        let mut categories = BTreeSet::new();
        let mut responsibles = BTreeSet::new();
        let mut teams = BTreeSet::new();
        let mut channels = BTreeSet::new();

        for record in table.iter() {
            years.insert(record.year);
            months.insert(record.month);
            if let Some(category) = &record.category {
                categories.insert(category.clone());
            }
            responsibles.insert(record.responsible.clone());
            teams.insert(record.team.clone());
            if let Some(channel) = &record.channel {
                channels.insert(channel.clone());
            }
        }

        Self {
            years: years.into_iter().collect(),
            months: months.into_iter().collect(),
            categories: categories.into_iter().collect(),
            responsibles: responsibles.into_iter().collect(),
            teams: teams.into_iter().collect(),
            channels: channels.into_iter().collect(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};
    use production_core::models::{Dimension, Selection, WorkOrderRecord};

    fn record(
        row: usize,
        team: &str,
        category: Option<&str>,
        channel: Option<&str>,
        date: (i32, u32, u32),
    ) -> WorkOrderRecord {
        let delivery_date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        WorkOrderRecord {
            row_number: row,
            id: None,
            team: team.to_string(),
            responsible: format!("R-{team}"),
            channel: channel.map(str::to_string),
            status: None,
            product_code: None,
            family: None,
            category: category.map(str::to_string),
            quantity: 10.0,
            weighted_quantity: None,
            delivery_date,
            year: delivery_date.year(),
            month: delivery_date.month(),
            month_year: production_core::time_utils::month_key(delivery_date),
        }
    }

    fn table() -> NormalizedTable {
        NormalizedTable::new(vec![
            record(1, "A", Some("BOX"), Some("WEB"), (2023, 11, 2)),
            record(2, "B", Some("BAG"), None, (2024, 1, 5)),
            record(3, "A", None, Some("STORE"), (2024, 2, 9)),
            record(4, "C", Some("BOX"), Some("WEB"), (2024, 2, 10)),
        ])
    }

    // ── apply_filters ────────────────────────────────────────────────────────

    #[test]
    fn test_default_criteria_keeps_everything() {
        let filtered = apply_filters(&table(), &FilterCriteria::default());
        assert_eq!(filtered, table());
    }

    #[test]
    fn test_filters_are_anded() {
        let criteria = FilterCriteria {
            years: Selection::only([2024]),
            teams: Selection::only(["A".to_string(), "C".to_string()]),
            ..Default::default()
        };
        let filtered = apply_filters(&table(), &criteria);
        let rows: Vec<usize> = filtered.iter().map(|r| r.row_number).collect();
        assert_eq!(rows, vec![3, 4]);
    }

    #[test]
    fn test_active_filter_excludes_missing_values() {
        let criteria = FilterCriteria {
            categories: Selection::only(["BOX".to_string(), "BAG".to_string()]),
            ..Default::default()
        };
        let filtered = apply_filters(&table(), &criteria);
        assert_eq!(filtered.len(), 3);
        assert!(filtered.iter().all(|r| r.category.is_some()));
    }

    #[test]
    fn test_select_none_yields_empty_result() {
        let mut criteria = FilterCriteria::default();
        criteria.select_none(Dimension::Month);
        assert!(apply_filters(&table(), &criteria).is_empty());
    }

    #[test]
    fn test_filtered_rows_are_subset_with_allowed_values() {
        let source = table();
        let allowed = ["WEB".to_string()];
        let criteria = FilterCriteria {
            channels: Selection::only(allowed.clone()),
            months: Selection::only([2, 11]),
            ..Default::default()
        };
        let filtered = apply_filters(&source, &criteria);
        for r in filtered.iter() {
            assert!(source.records.contains(r));
            assert!(allowed.contains(r.channel.as_ref().unwrap()));
            assert!([2, 11].contains(&r.month));
        }
        assert_eq!(filtered.len(), 2);
    }

    // ── FilterOptions ────────────────────────────────────────────────────────

    #[test]
    fn test_filter_options_sorted_and_distinct() {
        let options = FilterOptions::from_table(&table());
        assert_eq!(options.years, vec![2023, 2024]);
        assert_eq!(options.months, vec![1, 2, 11]);
        assert_eq!(options.categories, vec!["BAG", "BOX"]);
        assert_eq!(options.teams, vec!["A", "B", "C"]);
        assert_eq!(options.channels, vec!["STORE", "WEB"]);
    }

    #[test]
    fn test_filter_options_empty_table() {
        assert_eq!(
            FilterOptions::from_table(&NormalizedTable::default()),
            FilterOptions::default()
        );
    }
}
