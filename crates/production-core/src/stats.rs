use serde::{Deserialize, Serialize};

/// Guard added to the standard deviation when computing z-scores so that a
/// zero-variance column yields zeros instead of a division by zero.
pub const Z_SCORE_EPSILON: f64 = 1e-9;

// ── Quantiles ─────────────────────────────────────────────────────────────────

/// Linear-interpolated `p`-th percentile (0-100) of an ascending slice.
///
/// The position is `p / 100 * (n - 1)`; an empty slice yields `0.0`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return 0.0;
    };
    let position = (p / 100.0).clamp(0.0, 1.0) * last as f64;
    let below = position.floor() as usize;
    let above = (below + 1).min(last);
    let weight = position - below as f64;
    sorted[below] + weight * (sorted[above] - sorted[below])
}

// ── Moments ───────────────────────────────────────────────────────────────────

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by `n`); `None` for an empty slice.
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Population z-score of every value: `(x - mean) / (std + epsilon)`.
///
/// Returns an empty vector for empty input.
pub fn z_scores(values: &[f64], epsilon: f64) -> Vec<f64> {
    let (Some(m), Some(sd)) = (mean(values), population_std_dev(values)) else {
        return Vec::new();
    };
    values.iter().map(|v| (v - m) / (sd + epsilon)).collect()
}

// ── BoxSummary ────────────────────────────────────────────────────────────────

/// Five-number summary backing a box plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl BoxSummary {
    /// Summarise `values` (any order); `None` for an empty slice.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Some(Self {
            min: sorted[0],
            q1: percentile(&sorted, 25.0),
            median: percentile(&sorted, 50.0),
            q3: percentile(&sorted, 75.0),
            max: sorted[sorted.len() - 1],
        })
    }
}

// ── Histogram ─────────────────────────────────────────────────────────────────

/// One equal-width histogram bin, `[lower, upper)` (the last bin is closed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Bucket `values` into `bins` equal-width bins spanning their range.
///
/// When every value is identical the range is widened to `value ± 0.5`.
/// Empty input or `bins == 0` yields no bins.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let mut lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;

    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: lo + width * i as f64,
            upper: if i + 1 == bins { hi } else { lo + width * (i + 1) as f64 },
            count,
        })
        .collect()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
