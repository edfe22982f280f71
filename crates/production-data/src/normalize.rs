//! Rename, type-coerce, derive and retain: raw table → typed work orders.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Datelike;
use production_core::data_processors::{DateParser, NumberParser, NumericLocale, TextNormalizer};
use production_core::error::{PipelineError, Result};
use production_core::models::{
    Field, IngestionReport, NormalizedTable, RawTable, WorkOrderRecord,
};
use production_core::profile::IngestionProfile;
use production_core::time_utils::month_key;
use tracing::{debug, info, warn};

/// Normalize `raw` according to `profile`.
///
/// Fails with a schema error when a required column is absent after renaming.
/// Individual rows failing to parse or validate are excluded and counted;
/// no row is ever repaired.
pub fn normalize(
    raw: &RawTable,
    profile: &IngestionProfile,
) -> Result<(NormalizedTable, IngestionReport)> {
    let columns = resolve_columns(raw, profile);
    let required = profile.required_fields();

    if let Some(missing) = required.iter().find(|f| !columns.contains_key(*f)) {
        return Err(PipelineError::MissingColumn(missing.as_str().to_string()));
    }

    let mut records: Vec<WorkOrderRecord> = Vec::with_capacity(raw.rows.len());
    let mut rejected = 0usize;

    for (idx, row) in raw.rows.iter().enumerate() {
        let cells = RowCells {
            row,
            columns: &columns,
            locale: profile.numeric_locale,
        };
        match build_record(idx + 1, &cells, &required) {
            Some(record) => records.push(record),
            None => rejected += 1,
        }
    }

    if rejected > 0 {
        warn!("Rejected {} of {} rows during normalization", rejected, raw.rows.len());
    }

    let report = IngestionReport {
        rows_read: raw.rows.len() + raw.malformed_rows,
        rows_malformed: raw.malformed_rows,
        rows_rejected: rejected,
        rows_retained: records.len(),
    };
    info!(
        "Normalized work orders with profile '{}': {} read, {} retained",
        profile.name, report.rows_read, report.rows_retained
    );

    Ok((NormalizedTable::new(records), report))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Map each declared field to the index of the first column renamed onto it.
fn resolve_columns(raw: &RawTable, profile: &IngestionProfile) -> BTreeMap<Field, usize> {
    let mut columns = BTreeMap::new();
    for (idx, header) in raw.headers.iter().enumerate() {
        let name = profile.rename(header);
        if let Ok(field) = name.parse::<Field>() {
            if columns.contains_key(&field) {
                debug!("Ignoring duplicate column '{}' for field {}", header, field);
                continue;
            }
            columns.insert(field, idx);
        }
    }
    columns
}

/// Typed access to one row's cells.
struct RowCells<'a> {
    row: &'a [String],
    columns: &'a BTreeMap<Field, usize>,
    locale: NumericLocale,
}

impl RowCells<'_> {
    fn raw(&self, field: Field) -> Option<&str> {
        self.columns
            .get(&field)
            .and_then(|&idx| self.row.get(idx))
            .map(String::as_str)
    }

    fn text(&self, field: Field) -> Option<String> {
        self.raw(field).and_then(TextNormalizer::clean)
    }

    fn upper(&self, field: Field) -> Option<String> {
        self.raw(field).and_then(TextNormalizer::clean_upper)
    }

    fn number(&self, field: Field) -> Option<f64> {
        self.raw(field)
            .and_then(|v| NumberParser::parse(v, self.locale))
    }

    fn integer(&self, field: Field) -> Option<i64> {
        self.raw(field)
            .and_then(|v| NumberParser::parse_integer(v, self.locale))
    }
}

fn build_record(
    row_number: usize,
    cells: &RowCells<'_>,
    required: &BTreeSet<Field>,
) -> Option<WorkOrderRecord> {
    let reject = |reason: &str| {
        debug!("Row {} rejected: {}", row_number, reason);
        None
    };

    let Some(quantity) = cells.number(Field::Quantity) else {
        return reject("quantity missing or unparseable");
    };
    if quantity <= 0.0 {
        return reject("quantity not positive");
    }
    let Some(delivery_date) = cells.raw(Field::DeliveryDate).and_then(DateParser::parse_day_first)
    else {
        return reject("delivery date missing or unparseable");
    };
    let Some(team) = cells.text(Field::Team) else {
        return reject("team empty");
    };
    let Some(responsible) = cells.text(Field::Responsible) else {
        return reject("responsible empty");
    };

    let weighted_quantity = cells.number(Field::WeightedQuantity);
    if weighted_quantity.is_some_and(|w| w < 0.0) {
        return reject("weighted quantity negative");
    }

    let record = WorkOrderRecord {
        row_number,
        id: cells.text(Field::Id),
        team,
        responsible,
        channel: cells.text(Field::Channel),
        status: cells.text(Field::Status),
        product_code: cells.text(Field::ProductCode),
        family: cells.upper(Field::Family),
        category: cells.upper(Field::Category),
        quantity,
        weighted_quantity,
        delivery_date,
        year: delivery_date.year(),
        month: delivery_date.month(),
        month_year: month_key(delivery_date),
    };

    if let Some(absent) = required.iter().find(|&&f| !is_present(&record, cells, f)) {
        return reject(&format!("required field {} missing", absent));
    }
    Some(record)
}

/// Whether `field` carries a usable value for the purpose of the required set.
///
/// Year and month are checked against the raw source columns; the record's
/// own year and month are always derived from the delivery date.
fn is_present(record: &WorkOrderRecord, cells: &RowCells<'_>, field: Field) -> bool {
    match field {
        Field::Id => record.id.is_some(),
        Field::Channel => record.channel.is_some(),
        Field::Status => record.status.is_some(),
        Field::ProductCode => record.product_code.is_some(),
        Field::Family => record.family.is_some(),
        Field::Category => record.category.is_some(),
        Field::WeightedQuantity => record.weighted_quantity.is_some(),
        Field::Year => cells.integer(Field::Year).is_some(),
        Field::Month => cells
            .integer(Field::Month)
            .is_some_and(|m| (1..=12).contains(&m)),
        Field::Team | Field::Responsible | Field::Quantity | Field::DeliveryDate => true,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_table;
    use chrono::NaiveDate;

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
            malformed_rows: 0,
        }
    }

    fn scenario_table() -> RawTable {
        raw(
            &["team", "responsible", "quantity", "delivery_date"],
            &[
                &["A", "ANA", "10", "05/01/2024"],
                &["A", "ANA", "-5", "06/01/2024"],
                &["B", "BIA", "20", "05/01/2024"],
            ],
        )
    }

    // ── Retention ────────────────────────────────────────────────────────────

    #[test]
    fn test_non_positive_quantity_dropped() {
        let (table, report) = normalize(&scenario_table(), &IngestionProfile::headered()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.rows_rejected, 1);
        assert_eq!(report.rows_retained, 2);
        assert!(table.iter().all(|r| r.quantity > 0.0));
        assert_eq!(table.records[1].row_number, 3);
    }

    #[test]
    fn test_derived_columns_come_from_delivery_date() {
        let source = raw(
            &["team", "responsible", "quantity", "delivery_date", "MES_ANO", "category"],
            &[&["A", "ANA", "10", "31/12/2023", "01/2024", " box "]],
        );
        let (table, _) = normalize(&source, &IngestionProfile::headered()).unwrap();
        let record = &table.records[0];
        assert_eq!(record.year, 2023);
        assert_eq!(record.month, 12);
        assert_eq!(record.month_year, "2023-12");
        assert_eq!(record.category.as_deref(), Some("BOX"));
    }

    #[test]
    fn test_unparseable_values_become_missing_not_zero() {
        let source = raw(
            &["team", "responsible", "quantity", "delivery_date", "weighted_quantity"],
            &[
                &["A", "ANA", "abc", "05/01/2024", "1"],
                &["A", "ANA", "5", "not a date", "1"],
                &["A", "ANA", "5", "05/01/2024", "n/a"],
                &["", "ANA", "5", "05/01/2024", "1"],
            ],
        );
        let (table, report) = normalize(&source, &IngestionProfile::headered()).unwrap();
        assert_eq!(report.rows_rejected, 3);
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].weighted_quantity, None);
    }

    #[test]
    fn test_negative_weighted_quantity_rejected() {
        let source = raw(
            &["team", "responsible", "quantity", "delivery_date", "weighted_quantity"],
            &[&["A", "ANA", "5", "05/01/2024", "-1"]],
        );
        let (table, _) = normalize(&source, &IngestionProfile::headered()).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_profile_required_set_is_enforced() {
        let source = raw(
            &["team", "responsible", "quantity", "delivery_date", "category"],
            &[
                &["A", "ANA", "5", "05/01/2024", "BOX"],
                &["A", "ANA", "5", "05/01/2024", ""],
            ],
        );
        let mut profile = IngestionProfile::headered();
        let (lenient, _) = normalize(&source, &profile).unwrap();
        assert_eq!(lenient.len(), 2);

        profile.required.insert(Field::Category);
        let (strict, _) = normalize(&source, &profile).unwrap();
        assert_eq!(strict.len(), 1);
    }

    #[test]
    fn test_malformed_rows_counted_in_report() {
        let mut source = scenario_table();
        source.malformed_rows = 2;
        let (_, report) = normalize(&source, &IngestionProfile::headered()).unwrap();
        assert_eq!(report.rows_read, 5);
        assert_eq!(report.rows_malformed, 2);
    }

    // ── Schema ───────────────────────────────────────────────────────────────

    #[test]
    fn test_missing_required_column_is_schema_error() {
        let source = raw(&["team", "quantity", "delivery_date"], &[&["A", "1", "05/01/2024"]]);
        let err = normalize(&source, &IngestionProfile::headered()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn(ref c) if c == "responsible"));
    }

    #[test]
    fn test_legacy_profile_requires_year_column() {
        let source = raw(
            &["EQUIPE", "RESPONSAVEL", "QTD", "DATA DE ENTREGA", "MES ENTREGA"],
            &[&["A", "ANA", "1", "05/01/2024", "1"]],
        );
        let err = normalize(&source, &IngestionProfile::legacy()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn(ref c) if c == "year"));
    }

    #[test]
    fn test_first_duplicate_column_wins() {
        let source = raw(
            &["team", "responsible", "QTD", "quantity", "delivery_date"],
            &[&["A", "ANA", "7", "99", "05/01/2024"]],
        );
        let (table, _) = normalize(&source, &IngestionProfile::headered()).unwrap();
        assert_eq!(table.records[0].quantity, 7.0);
    }

    // ── Legacy export ────────────────────────────────────────────────────────

    #[test]
    fn test_legacy_positional_comma_decimal_export() {
        let profile = IngestionProfile::legacy();
        let csv = "1,OS-1,U1,F,A,ANA,LOJA,ENTREGUE,C001,caixa,\"1.300,5\",05/01/2024,1,1,2024,01/2024,box,\"2,5\"\n\
                   2,OS-2,U2,F,B,BIA,LOJA,ENTREGUE,C002,caixa,\"40\",07/01/2024,1,1,,01/2024,box,\n";
        let raw_table = read_table(csv.as_bytes(), &profile.header).unwrap();
        let (table, report) = normalize(&raw_table, &profile).unwrap();

        // Second row lacks the raw year, which the legacy profile requires.
        assert_eq!(report.rows_rejected, 1);
        let record = &table.records[0];
        assert_eq!(record.id.as_deref(), Some("OS-1"));
        assert_eq!(record.quantity, 1300.5);
        assert_eq!(record.weighted_quantity, Some(2.5));
        assert_eq!(record.family.as_deref(), Some("CAIXA"));
        assert_eq!(record.product_code.as_deref(), Some("C001"));
        assert_eq!(record.status.as_deref(), Some("ENTREGUE"));
        assert_eq!(
            record.delivery_date,
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
    }

    // ── Idempotence ──────────────────────────────────────────────────────────

    #[test]
    fn test_normalize_is_idempotent_on_its_own_output() {
        let (first, _) = normalize(&scenario_table(), &IngestionProfile::headered()).unwrap();
        let (second, report) =
            normalize(&first.to_raw_table(), &IngestionProfile::headered()).unwrap();

        assert_eq!(second.len(), first.len());
        assert_eq!(report.rows_rejected, 0);
        let q1: Vec<f64> = first.iter().map(|r| r.quantity).collect();
        let q2: Vec<f64> = second.iter().map(|r| r.quantity).collect();
        assert_eq!(q1, q2);
    }

    #[test]
    fn test_legacy_output_renormalizes_with_legacy_required_set() {
        let profile = IngestionProfile::legacy();
        let csv = "1,OS-1,U1,F,A,ANA,LOJA,ENTREGUE,C001,caixa,\"12\",05/01/2024,1,1,2024,01/2024,box,\n";
        let raw_table = read_table(csv.as_bytes(), &profile.header).unwrap();
        let (first, _) = normalize(&raw_table, &profile).unwrap();

        let mut replay = profile.clone();
        replay.numeric_locale = NumericLocale::Plain;
        let (second, _) = normalize(&first.to_raw_table(), &replay).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second.records[0].category.as_deref(), Some("BOX"));
    }
}
