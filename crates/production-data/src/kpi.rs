//! Sector KPI tables.
//!
//! Sector exports are transposed: the first column names a metric and every
//! following column is one month. The header row is ignored and months are
//! labelled from a fixed calendar instead.

use std::path::Path;
use std::time::Duration;

use production_core::data_processors::{NumberParser, NumericLocale, TextNormalizer};
use production_core::error::Result;
use production_core::profile::HeaderMode;
use production_core::time_utils::{add_months, format_month_key};
use serde::Serialize;
use tracing::debug;

use crate::reader::{fetch_bytes, read_table, SourceLocation};

/// Month index → label mapping for sector KPI columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KpiCalendar {
    pub start_year: i32,
    pub start_month: u32,
}

impl Default for KpiCalendar {
    /// Sector exports start in January 2023.
    fn default() -> Self {
        Self {
            start_year: 2023,
            start_month: 1,
        }
    }
}

impl KpiCalendar {
    /// `"YYYY-MM"` label of the `index`-th month column (0-based).
    pub fn label(&self, index: usize) -> String {
        let (year, month) = add_months(self.start_year, self.start_month, index as u32);
        format_month_key(year, month)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiPoint {
    pub month: String,
    pub value: Option<f64>,
}

/// One metric's monthly series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSeries {
    pub metric: String,
    pub points: Vec<KpiPoint>,
}

/// All metrics of one sector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorKpiTable {
    pub sector: String,
    pub metrics: Vec<KpiSeries>,
}

/// Parse a transposed sector export.
///
/// Rows without a metric name are dropped. Cells that do not parse (a
/// trailing `%` is tolerated) become `None`.
pub fn parse_sector_kpis(
    sector: &str,
    bytes: &[u8],
    calendar: KpiCalendar,
    locale: NumericLocale,
) -> Result<SectorKpiTable> {
    let table = read_table(bytes, &HeaderMode::FirstRow)?;

    let metrics: Vec<KpiSeries> = table
        .rows
        .iter()
        .filter_map(|row| {
            let (name, cells) = row.split_first()?;
            let metric = TextNormalizer::clean(name)?;
            let points = cells
                .iter()
                .enumerate()
                .map(|(i, cell)| KpiPoint {
                    month: calendar.label(i),
                    value: NumberParser::parse(cell.trim().trim_end_matches('%'), locale),
                })
                .collect();
            Some(KpiSeries { metric, points })
        })
        .collect();

    debug!("Sector '{}': {} KPI series", sector, metrics.len());
    Ok(SectorKpiTable {
        sector: sector.to_string(),
        metrics,
    })
}

/// Fetch and parse a sector export. The sector is named after the file stem.
pub fn load_sector_kpis(
    location: &SourceLocation,
    calendar: KpiCalendar,
    locale: NumericLocale,
    timeout: Duration,
) -> Result<SectorKpiTable> {
    let bytes = fetch_bytes(location, timeout)?;
    parse_sector_kpis(&sector_name(location), &bytes, calendar, locale)
}

fn sector_name(location: &SourceLocation) -> String {
    let raw = match location {
        SourceLocation::File(path) => path.to_string_lossy().into_owned(),
        SourceLocation::Url(url) => url.clone(),
    };
    let last = raw.rsplit('/').next().unwrap_or(&raw).to_string();
    Path::new(&last)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(last)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_calendar_labels_from_january_2023() {
        let calendar = KpiCalendar::default();
        assert_eq!(calendar.label(0), "2023-01");
        assert_eq!(calendar.label(11), "2023-12");
        assert_eq!(calendar.label(12), "2024-01");
    }

    #[test]
    fn test_parse_sector_kpis_ignores_header_labels() {
        let csv = b"Indicador,jan,fev,mar\n\
                    OEE,81.5,79%,\n\
                    Refugo,2,3,4\n\
                    ,1,1,1\n";
        let table = parse_sector_kpis("corte", csv, KpiCalendar::default(), NumericLocale::Plain).unwrap();

        assert_eq!(table.sector, "corte");
        assert_eq!(table.metrics.len(), 2);
        let oee = &table.metrics[0];
        assert_eq!(oee.metric, "OEE");
        assert_eq!(
            oee.points,
            vec![
                KpiPoint { month: "2023-01".to_string(), value: Some(81.5) },
                KpiPoint { month: "2023-02".to_string(), value: Some(79.0) },
                KpiPoint { month: "2023-03".to_string(), value: None },
            ]
        );
    }

    #[test]
    fn test_parse_sector_kpis_comma_locale() {
        let csv = b"Metric,m1\nOEE,\"81,5\"\n";
        let table = parse_sector_kpis("s", csv, KpiCalendar::default(), NumericLocale::CommaDecimal).unwrap();
        assert_eq!(table.metrics[0].points[0].value, Some(81.5));
    }

    #[test]
    fn test_sector_name_from_location() {
        assert_eq!(
            sector_name(&SourceLocation::File(PathBuf::from("/data/kpi_corte.csv"))),
            "kpi_corte"
        );
        assert_eq!(
            sector_name(&SourceLocation::Url("https://host/x/solda.csv".to_string())),
            "solda"
        );
    }
}
