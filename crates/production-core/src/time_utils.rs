use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use tracing::warn;

// ── Month keys ────────────────────────────────────────────────────────────────

/// Format a `"YYYY-MM"` month key.
pub fn format_month_key(year: i32, month: u32) -> String {
    format!("{:04}-{:02}", year, month)
}

/// The `"YYYY-MM"` key of the month containing `date`.
pub fn month_key(date: NaiveDate) -> String {
    format_month_key(date.year(), date.month())
}

/// Advance `(year, month)` by `offset` months.
pub fn add_months(year: i32, month: u32, offset: u32) -> (i32, u32) {
    let zero_based = i64::from(year) * 12 + i64::from(month) - 1 + i64::from(offset);
    ((zero_based.div_euclid(12)) as i32, (zero_based.rem_euclid(12) + 1) as u32)
}

fn month_key_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // 2024-03, 2024/3
            Regex::new(r"^(?P<year>\d{4})[-/](?P<month>\d{1,2})$").expect("valid regex"),
            // 03/2024, 3-2024
            Regex::new(r"^(?P<month>\d{1,2})[-/](?P<year>\d{4})$").expect("valid regex"),
            // 2024-03-01 (first day of the month, as spreadsheets export it)
            Regex::new(r"^(?P<year>\d{4})-(?P<month>\d{1,2})-\d{1,2}$").expect("valid regex"),
        ]
    })
}

/// Parse a month key written as `YYYY-MM`, `YYYY/MM`, `MM/YYYY`, `MM-YYYY`
/// or `YYYY-MM-DD`.
///
/// Returns `None` (and logs) for anything else or for a month outside 1-12.
pub fn parse_month_key(raw: &str) -> Option<(i32, u32)> {
    let trimmed = raw.trim();
    for pattern in month_key_patterns() {
        if let Some(caps) = pattern.captures(trimmed) {
            let year: i32 = caps["year"].parse().ok()?;
            let month: u32 = caps["month"].parse().ok()?;
            if (1..=12).contains(&month) {
                return Some((year, month));
            }
            break;
        }
    }
    warn!("parse_month_key: unrecognised month key \"{}\"", trimmed);
    None
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_key_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
        assert_eq!(month_key(date), "2024-03");
        assert_eq!(format_month_key(987, 11), "0987-11");
    }

    #[test]
    fn test_add_months() {
        assert_eq!(add_months(2023, 1, 0), (2023, 1));
        assert_eq!(add_months(2023, 1, 11), (2023, 12));
        assert_eq!(add_months(2023, 1, 12), (2024, 1));
        assert_eq!(add_months(2023, 11, 3), (2024, 2));
    }

    #[test]
    fn test_parse_month_key_variants() {
        assert_eq!(parse_month_key("2024-03"), Some((2024, 3)));
        assert_eq!(parse_month_key("2024/3"), Some((2024, 3)));
        assert_eq!(parse_month_key("03/2024"), Some((2024, 3)));
        assert_eq!(parse_month_key(" 3-2024 "), Some((2024, 3)));
        assert_eq!(parse_month_key("2024-03-01"), Some((2024, 3)));
    }

    #[test]
    fn test_parse_month_key_rejects_invalid() {
        assert_eq!(parse_month_key("2024-13"), None);
        assert_eq!(parse_month_key("march"), None);
        assert_eq!(parse_month_key(""), None);
    }
}
