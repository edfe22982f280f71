use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

// ── Field ─────────────────────────────────────────────────────────────────────

/// A column of the normalized work-order schema.
///
/// Raw source columns are renamed onto these canonical names; anything that
/// does not resolve to a `Field` is carried through the rename step and then
/// ignored.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Id,
    Team,
    Responsible,
    Channel,
    Status,
    ProductCode,
    Family,
    Category,
    Quantity,
    WeightedQuantity,
    DeliveryDate,
    Year,
    Month,
}

impl Field {
    /// Every field, in canonical column order.
    pub const ALL: [Field; 13] = [
        Field::Id,
        Field::Team,
        Field::Responsible,
        Field::Channel,
        Field::Status,
        Field::ProductCode,
        Field::Family,
        Field::Category,
        Field::Quantity,
        Field::WeightedQuantity,
        Field::DeliveryDate,
        Field::Year,
        Field::Month,
    ];

    /// Fields that every deployment needs in order to build a record at all.
    pub const ALWAYS_REQUIRED: [Field; 4] = [
        Field::Quantity,
        Field::Team,
        Field::Responsible,
        Field::DeliveryDate,
    ];

    /// The canonical (post-rename) column name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Team => "team",
            Field::Responsible => "responsible",
            Field::Channel => "channel",
            Field::Status => "status",
            Field::ProductCode => "product_code",
            Field::Family => "family",
            Field::Category => "category",
            Field::Quantity => "quantity",
            Field::WeightedQuantity => "weighted_quantity",
            Field::DeliveryDate => "delivery_date",
            Field::Year => "year",
            Field::Month => "month",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == value)
            .ok_or_else(|| PipelineError::UnknownField(value.to_string()))
    }
}

// ── RawTable ──────────────────────────────────────────────────────────────────

/// A delimited table exactly as read from the source, before any typing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    /// Column names, either from the header row or supplied positionally.
    pub headers: Vec<String>,
    /// Well-formed data rows (one string per header).
    pub rows: Vec<Vec<String>>,
    /// Rows skipped because their column count did not match the header.
    pub malformed_rows: usize,
}

// ── WorkOrderRecord ───────────────────────────────────────────────────────────

/// One normalized work order (OS).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderRecord {
    /// 1-based position of the row among the source's data rows.
    pub row_number: usize,
    pub id: Option<String>,
    pub team: String,
    pub responsible: String,
    pub channel: Option<String>,
    pub status: Option<String>,
    pub product_code: Option<String>,
    /// Product family, upper-cased.
    pub family: Option<String>,
    /// Converter category, upper-cased.
    pub category: Option<String>,
    /// Always strictly positive.
    pub quantity: f64,
    /// Never negative when present.
    pub weighted_quantity: Option<f64>,
    pub delivery_date: NaiveDate,
    /// Derived from `delivery_date`.
    pub year: i32,
    /// Derived from `delivery_date` (1-12).
    pub month: u32,
    /// Derived from `delivery_date`, formatted `"YYYY-MM"`.
    pub month_year: String,
}

impl WorkOrderRecord {
    /// The measure stored in `column`, if present.
    pub fn value(&self, column: ValueColumn) -> Option<f64> {
        match column {
            ValueColumn::Quantity => Some(self.quantity),
            ValueColumn::WeightedQuantity => self.weighted_quantity,
        }
    }

    /// Render one field back to its canonical text form.
    fn render(&self, field: Field) -> String {
        match field {
            Field::Id => self.id.clone().unwrap_or_default(),
            Field::Team => self.team.clone(),
            Field::Responsible => self.responsible.clone(),
            Field::Channel => self.channel.clone().unwrap_or_default(),
            Field::Status => self.status.clone().unwrap_or_default(),
            Field::ProductCode => self.product_code.clone().unwrap_or_default(),
            Field::Family => self.family.clone().unwrap_or_default(),
            Field::Category => self.category.clone().unwrap_or_default(),
            Field::Quantity => self.quantity.to_string(),
            Field::WeightedQuantity => self
                .weighted_quantity
                .map(|w| w.to_string())
                .unwrap_or_default(),
            Field::DeliveryDate => self.delivery_date.format("%Y-%m-%d").to_string(),
            Field::Year => self.year.to_string(),
            Field::Month => self.month.to_string(),
        }
    }
}

// ── NormalizedTable ───────────────────────────────────────────────────────────

/// The validated, typed table produced by ingestion (and by filtering).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTable {
    pub records: Vec<WorkOrderRecord>,
}

impl NormalizedTable {
    pub fn new(records: Vec<WorkOrderRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkOrderRecord> {
        self.records.iter()
    }

    /// Render the table with canonical headers, plain decimals and ISO dates.
    ///
    /// The output can be fed back through normalization with any profile
    /// that uses the plain numeric locale, or written out as CSV.
    pub fn to_raw_table(&self) -> RawTable {
        RawTable {
            headers: Field::ALL.iter().map(|f| f.as_str().to_string()).collect(),
            rows: self
                .records
                .iter()
                .map(|r| Field::ALL.iter().map(|&f| r.render(f)).collect())
                .collect(),
            malformed_rows: 0,
        }
    }
}

// ── IngestionReport ───────────────────────────────────────────────────────────

/// Row accounting for a single ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    /// Data rows encountered in the source (well-formed plus malformed).
    pub rows_read: usize,
    /// Rows skipped for having the wrong column count.
    pub rows_malformed: usize,
    /// Well-formed rows excluded by parsing or required-field checks.
    pub rows_rejected: usize,
    /// Rows that made it into the normalized table.
    pub rows_retained: usize,
}

// ── Grouping dimensions and value columns ─────────────────────────────────────

/// Numeric column an aggregation reduces over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueColumn {
    #[default]
    Quantity,
    WeightedQuantity,
}

/// A categorical or temporal attribute records can be grouped or filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Year,
    Month,
    MonthYear,
    Date,
    Team,
    Responsible,
    Channel,
    Category,
    Family,
    ProductCode,
    Status,
}

impl Dimension {
    /// Extract this dimension's key from `record`; `None` when the underlying
    /// optional field is missing.
    pub fn key(&self, record: &WorkOrderRecord) -> Option<KeyValue> {
        let text = |v: &Option<String>| v.as_ref().map(|s| KeyValue::Text(s.clone()));
        match self {
            Dimension::Year => Some(KeyValue::Int(i64::from(record.year))),
            Dimension::Month => Some(KeyValue::Int(i64::from(record.month))),
            Dimension::MonthYear => Some(KeyValue::Text(record.month_year.clone())),
            Dimension::Date => Some(KeyValue::Date(record.delivery_date)),
            Dimension::Team => Some(KeyValue::Text(record.team.clone())),
            Dimension::Responsible => Some(KeyValue::Text(record.responsible.clone())),
            Dimension::Channel => text(&record.channel),
            Dimension::Category => text(&record.category),
            Dimension::Family => text(&record.family),
            Dimension::ProductCode => text(&record.product_code),
            Dimension::Status => text(&record.status),
        }
    }
}

impl FromStr for Dimension {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "year" => Ok(Dimension::Year),
            "month" => Ok(Dimension::Month),
            "month_year" => Ok(Dimension::MonthYear),
            "date" => Ok(Dimension::Date),
            "team" => Ok(Dimension::Team),
            "responsible" => Ok(Dimension::Responsible),
            "channel" => Ok(Dimension::Channel),
            "category" => Ok(Dimension::Category),
            "family" => Ok(Dimension::Family),
            "product_code" => Ok(Dimension::ProductCode),
            "status" => Ok(Dimension::Status),
            other => Err(PipelineError::UnknownField(other.to_string())),
        }
    }
}

/// One component of a grouping key.
///
/// Ordering is numeric for integers, chronological for dates and lexical for
/// text, which is also the tie-break order of every ranking.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum KeyValue {
    Int(i64),
    Date(NaiveDate),
    Text(String),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Int(v) => write!(f, "{}", v),
            KeyValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            KeyValue::Text(s) => f.write_str(s),
        }
    }
}

// ── Filter criteria ───────────────────────────────────────────────────────────

/// Inclusion list for one filter dimension.
///
/// `All` bypasses the dimension. `Only` with an empty set is an active filter
/// with nothing selected and therefore matches no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection<T: Ord> {
    All,
    Only(BTreeSet<T>),
}

impl<T: Ord> Default for Selection<T> {
    fn default() -> Self {
        Selection::All
    }
}

impl<T: Ord> Selection<T> {
    /// Active filter restricted to `values`.
    pub fn only(values: impl IntoIterator<Item = T>) -> Self {
        Selection::Only(values.into_iter().collect())
    }

    /// Active filter with nothing selected.
    pub fn none() -> Self {
        Selection::Only(BTreeSet::new())
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Selection::Only(_))
    }

    /// Whether a record whose dimension value is `value` passes.
    ///
    /// A missing value never passes an active filter.
    pub fn allows(&self, value: Option<&T>) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(set) => value.is_some_and(|v| set.contains(v)),
        }
    }
}

/// The user's filter selections, one per filterable dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub years: Selection<i32>,
    pub months: Selection<u32>,
    pub categories: Selection<String>,
    pub responsibles: Selection<String>,
    pub teams: Selection<String>,
    pub channels: Selection<String>,
}

impl FilterCriteria {
    /// Whether every active dimension admits `record`.
    pub fn matches(&self, record: &WorkOrderRecord) -> bool {
        self.years.allows(Some(&record.year))
            && self.months.allows(Some(&record.month))
            && self.categories.allows(record.category.as_ref())
            && self.responsibles.allows(Some(&record.responsible))
            && self.teams.allows(Some(&record.team))
            && self.channels.allows(record.channel.as_ref())
    }

    /// Activate `dimension` with an empty selection.
    ///
    /// Returns `false` when `dimension` is not filterable.
    pub fn select_none(&mut self, dimension: Dimension) -> bool {
        match dimension {
            Dimension::Year => self.years = Selection::none(),
            Dimension::Month => self.months = Selection::none(),
            Dimension::Category => self.categories = Selection::none(),
            Dimension::Responsible => self.responsibles = Selection::none(),
            Dimension::Team => self.teams = Selection::none(),
            Dimension::Channel => self.channels = Selection::none(),
            _ => return false,
        }
        true
    }
}

// ── Capacity planning ─────────────────────────────────────────────────────────

/// Work-shift configuration used by the production projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftPattern {
    /// One shift (factor 1.0).
    Single,
    /// Two shifts (factor 1.15).
    Double,
    /// One shift with overtime (factor 1.2).
    SingleWithOvertime,
}

impl ShiftPattern {
    /// Throughput multiplier for this pattern.
    pub fn factor(&self) -> f64 {
        match self {
            ShiftPattern::Single => 1.0,
            ShiftPattern::Double => 1.15,
            ShiftPattern::SingleWithOvertime => 1.2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftPattern::Single => "single",
            ShiftPattern::Double => "double",
            ShiftPattern::SingleWithOvertime => "overtime",
        }
    }
}

impl FromStr for ShiftPattern {
    type Err = PipelineError;

    /// Accepts `"single"`, `"double"` and `"overtime"` (case-insensitive).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "single" => Ok(ShiftPattern::Single),
            "double" => Ok(ShiftPattern::Double),
            "overtime" | "single_with_overtime" => Ok(ShiftPattern::SingleWithOvertime),
            other => Err(PipelineError::InvalidShift(other.to_string())),
        }
    }
}

/// One month of the capacity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityLogEntry {
    pub year: i32,
    pub month: u32,
    pub headcount: f64,
    pub working_days: f64,
    pub shift_factor: f64,
    /// Realized production for the month.
    pub production: f64,
    /// Standard output per resource-day; `None` when it cannot be derived.
    pub sdor: Option<f64>,
}

impl CapacityLogEntry {
    /// `"YYYY-MM"` key of the logged month.
    pub fn month_key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn record(team: &str, category: Option<&str>, qty: f64) -> WorkOrderRecord {
        WorkOrderRecord {
            row_number: 1,
            id: Some("OS-1".to_string()),
            team: team.to_string(),
            responsible: "ANA".to_string(),
            channel: None,
            status: None,
            product_code: None,
            family: None,
            category: category.map(str::to_string),
            quantity: qty,
            weighted_quantity: Some(qty * 1.5),
            delivery_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            year: 2024,
            month: 1,
            month_year: "2024-01".to_string(),
        }
    }

    // ── Field ────────────────────────────────────────────────────────────────

    #[test]
    fn test_field_round_trips_through_str() {
        for field in Field::ALL {
            assert_eq!(field.as_str().parse::<Field>().unwrap(), field);
        }
    }

    #[test]
    fn test_field_unknown_name() {
        let err = "QTD".parse::<Field>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown field: QTD");
    }

    #[test]
    fn test_field_serde_snake_case() {
        let json = serde_json::to_string(&Field::WeightedQuantity).unwrap();
        assert_eq!(json, "\"weighted_quantity\"");
    }

    // ── Selection / FilterCriteria ───────────────────────────────────────────

    #[test]
    fn test_selection_all_allows_missing() {
        let sel: Selection<String> = Selection::All;
        assert!(sel.allows(None));
        assert!(!sel.is_active());
    }

    #[test]
    fn test_selection_none_allows_nothing() {
        let sel: Selection<i32> = Selection::none();
        assert!(sel.is_active());
        assert!(!sel.allows(Some(&2024)));
        assert!(!sel.allows(None));
    }

    #[test]
    fn test_selection_only_rejects_missing_value() {
        let sel = Selection::only(["BOX".to_string()]);
        assert!(sel.allows(Some(&"BOX".to_string())));
        assert!(!sel.allows(None));
    }

    #[test]
    fn test_criteria_default_matches_everything() {
        assert!(FilterCriteria::default().matches(&record("A", None, 10.0)));
    }

    #[test]
    fn test_criteria_select_none_only_for_filterable() {
        let mut criteria = FilterCriteria::default();
        assert!(criteria.select_none(Dimension::Team));
        assert!(!criteria.select_none(Dimension::Family));
        assert!(!criteria.matches(&record("A", None, 10.0)));
    }

    // ── Dimension / KeyValue ─────────────────────────────────────────────────

    #[test]
    fn test_dimension_key_missing_optional() {
        let r = record("A", None, 10.0);
        assert_eq!(Dimension::Category.key(&r), None);
        assert_eq!(Dimension::Month.key(&r), Some(KeyValue::Int(1)));
        assert_eq!(
            Dimension::MonthYear.key(&r),
            Some(KeyValue::Text("2024-01".to_string()))
        );
    }

    #[test]
    fn test_key_value_ordering_and_display() {
        let a = KeyValue::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        let b = KeyValue::Date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert!(a < b);
        assert!(KeyValue::Int(2) < KeyValue::Int(10));
        assert_eq!(a.to_string(), "2024-01-05");
    }

    #[test]
    fn test_dimension_from_str() {
        assert_eq!("Team".parse::<Dimension>().unwrap(), Dimension::Team);
        assert!("colour".parse::<Dimension>().is_err());
    }

    // ── NormalizedTable ──────────────────────────────────────────────────────

    #[test]
    fn test_to_raw_table_canonical_layout() {
        let table = NormalizedTable::new(vec![record("A", Some("BOX"), 10.0)]);
        let raw = table.to_raw_table();

        assert_eq!(raw.headers.len(), Field::ALL.len());
        assert_eq!(raw.headers[0], "id");
        let qty_idx = raw.headers.iter().position(|h| h == "quantity").unwrap();
        let date_idx = raw.headers.iter().position(|h| h == "delivery_date").unwrap();
        assert_eq!(raw.rows[0][qty_idx], "10");
        assert_eq!(raw.rows[0][date_idx], "2024-01-05");
    }

    // ── ShiftPattern ─────────────────────────────────────────────────────────

    #[test]
    fn test_shift_pattern_factors() {
        assert_eq!(ShiftPattern::Single.factor(), 1.0);
        assert_eq!(ShiftPattern::Double.factor(), 1.15);
        assert_eq!(ShiftPattern::SingleWithOvertime.factor(), 1.2);
    }

    #[test]
    fn test_shift_pattern_from_str() {
        assert_eq!("DOUBLE".parse::<ShiftPattern>().unwrap(), ShiftPattern::Double);
        assert_eq!(
            "overtime".parse::<ShiftPattern>().unwrap(),
            ShiftPattern::SingleWithOvertime
        );
        assert!("triple".parse::<ShiftPattern>().is_err());
    }

    #[test]
    fn test_capacity_entry_month_key() {
        let entry = CapacityLogEntry {
            year: 2024,
            month: 3,
            headcount: 10.0,
            working_days: 20.0,
            shift_factor: 1.0,
            production: 12_000.0,
            sdor: Some(60.0),
        };
        assert_eq!(entry.month_key(), "2024-03");
    }
}
