use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── NumericLocale ─────────────────────────────────────────────────────────────

/// How decimal and thousands separators are written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericLocale {
    /// `1300.5`: dot decimal, no thousands separator.
    #[default]
    Plain,
    /// `1.300,5`: comma decimal, dot thousands (legacy exports).
    CommaDecimal,
}

// ── NumberParser ──────────────────────────────────────────────────────────────

/// Parses numeric cells according to a [`NumericLocale`].
pub struct NumberParser;

impl NumberParser {
    /// Parse `raw` into a finite number.
    ///
    /// Empty cells and anything that does not parse under `locale` yield
    /// `None` (a missing value, never a zero).
    pub fn parse(raw: &str, locale: NumericLocale) -> Option<f64> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let parsed = match locale {
            NumericLocale::Plain => trimmed.parse::<f64>().ok(),
            NumericLocale::CommaDecimal => {
                let normalised: String = trimmed
                    .chars()
                    .filter(|&c| c != '.')
                    .map(|c| if c == ',' { '.' } else { c })
                    .collect();
                normalised.parse::<f64>().ok()
            }
        };

        parsed.filter(|v| v.is_finite())
    }

    /// Parse `raw` as a whole number (e.g. a year or month column).
    ///
    /// `"2024"`, `"2024.0"` and `"2024,0"` (comma locale) are all accepted;
    /// values with a fractional part are not.
    pub fn parse_integer(raw: &str, locale: NumericLocale) -> Option<i64> {
        let value = Self::parse(raw, locale)?;
        if value.fract() != 0.0 || value.abs() > i64::MAX as f64 {
            return None;
        }
        Some(value as i64)
    }
}

// ── DateParser ────────────────────────────────────────────────────────────────

/// Parses day-first calendar dates.
pub struct DateParser;

impl DateParser {
    /// Date-only patterns, tried in order.
    const DATE_FORMATS: &'static [&'static str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d"];

    /// Date-time patterns; the time part is discarded.
    const DATETIME_FORMATS: &'static [&'static str] = &[
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ];

    /// Parse `raw` using day/month/year ordering (ISO `YYYY-MM-DD` is also
    /// accepted). Unparseable input yields `None`.
    ///
    /// Two-digit years are rejected.
    pub fn parse_day_first(raw: &str) -> Option<NaiveDate> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let parsed = Self::DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
            .or_else(|| {
                Self::DATETIME_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                    .map(|dt| dt.date())
            });

        match parsed {
            Some(date) if date.year() >= 1900 => Some(date),
            _ => {
                debug!("DateParser: could not parse date \"{}\"", trimmed);
                None
            }
        }
    }
}

// ── TextNormalizer ────────────────────────────────────────────────────────────

/// Cleans free-text cells.
pub struct TextNormalizer;

impl TextNormalizer {
    /// Trim `raw`; blank cells become `None`.
    pub fn clean(raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Trim and upper-case `raw` for case-insensitive grouping.
    pub fn clean_upper(raw: &str) -> Option<String> {
        Self::clean(raw).map(|s| s.to_uppercase())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
