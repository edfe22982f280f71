/// Render `value` with `decimals` fixed decimals and `,` thousands grouping.
///
/// ```
/// use production_core::formatting::format_number;
///
/// assert_eq!(format_number(13_800.0, 0), "13,800");
/// assert_eq!(format_number(81.25, 1), "81.3");
/// assert_eq!(format_number(-2_500.75, 2), "-2,500.75");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let scale = 10_f64.powi(decimals as i32);
    // Scaled nudge so binary midpoints such as 1.005 round away from zero.
    let magnitude = value.abs() * scale;
    let rounded = (magnitude + magnitude * f64::EPSILON).round() / scale;

    let fixed = format!("{:.*}", decimals as usize, rounded);
    let (whole, fraction) = match fixed.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::new();
    if value < 0.0 && rounded > 0.0 {
        out.push('-');
    }
    out.push_str(&group_thousands(whole));
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

/// Format a production quantity with no decimals, as the dashboard KPIs do.
///
/// ```
/// use production_core::formatting::format_quantity;
///
/// assert_eq!(format_quantity(13_800.4), "13,800");
/// ```
pub fn format_quantity(value: f64) -> String {
    format_number(value, 0)
}

/// Format an already-computed percentage with one decimal and a `%` sign.
pub fn format_share(percent: f64) -> String {
    format!("{}%", format_number(percent, 1))
}

/// Format an optional measure, rendering `None` as `"n/a"`.
pub fn format_optional(value: Option<f64>, decimals: u32) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format_number(v, decimals))
}

/// Calculate `(part / whole) * 100`, rounded to `decimal_places`.
///
/// Returns `None` if `whole` is zero.
///
/// ```
/// use production_core::formatting::percentage;
///
/// assert_eq!(percentage(50.0, 200.0, 1), Some(25.0));
/// assert_eq!(percentage(0.0, 0.0, 2), None);
/// ```
pub fn percentage(part: f64, whole: f64, decimal_places: u32) -> Option<f64> {
    if whole == 0.0 {
        return None;
    }
    let raw = (part / whole) * 100.0;
    let factor = 10_f64.powi(decimal_places as i32);
    Some((raw * factor).round() / factor)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────
