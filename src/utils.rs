//! Shared helpers used across pipeline stages.
//!
//! Dtype classification, strict numeric string parsing, and the descriptive
//! statistics the null/outlier/scaling stages are built on. All statistics
//! operate on materialized `Vec<f64>` values so every stage computes bounds
//! from the same definitions: linear-interpolated quantiles and population
//! (not sample) variance.

use polars::prelude::*;

// =============================================================================
// Dtype classification
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Datetime(_, _) | DataType::Date | DataType::Time
    )
}

/// Check if a DataType is textual.
#[inline]
pub fn is_string_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Categorical(_, _))
}

// =============================================================================
// Strict numeric parsing
// =============================================================================

/// Parse a string as f64, accepting surrounding whitespace only.
///
/// Unlike lenient parsers this rejects currency symbols and thousands
/// separators: a column where those appear is text, not mis-typed numbers.
pub fn parse_numeric_strict(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Whether any value in a parsed set has a fractional part.
pub fn any_fractional(values: &[f64]) -> bool {
    values.iter().any(|v| v.fract() != 0.0)
}

// =============================================================================
// Series extraction
// =============================================================================

/// Collect the non-null values of a numeric Series as f64, preserving order.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<f64>> {
    let casted = series.cast(&DataType::Float64)?;
    let ca = casted.f64()?;
    Ok(ca.into_iter().flatten().filter(|v| v.is_finite()).collect())
}

/// The most frequent non-null value of a string Series.
///
/// Ties break toward the value that appears first in the column, matching
/// first-encounter order rather than lexical order.
pub fn string_mode(series: &Series) -> Option<String> {
    let ca = series.str().ok()?;

    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for val in ca.into_iter().flatten() {
        let entry = counts.entry(val).or_insert(0);
        if *entry == 0 {
            order.push(val);
        }
        *entry += 1;
    }

    order
        .into_iter()
        .max_by_key(|val| counts.get(val).copied().unwrap_or(0))
        .map(|val| val.to_string())
}

// =============================================================================
// Descriptive statistics
// =============================================================================

/// Arithmetic mean. Returns None for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance (divides by N, not N-1).
pub fn population_variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some(sum_sq / values.len() as f64)
}

/// Population standard deviation.
pub fn population_std(values: &[f64]) -> Option<f64> {
    population_variance(values).map(f64::sqrt)
}

/// Quantile with linear interpolation between order statistics.
///
/// `q` in [0, 1]. For a sorted sample x_0..x_{n-1} the quantile sits at
/// virtual index q*(n-1), interpolating between the surrounding values.
pub fn quantile_linear(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let frac = pos - lower as f64;
    Some(sorted[lower] + frac * (sorted[upper] - sorted[lower]))
}

/// Median via linear-interpolated quantile.
pub fn median(values: &[f64]) -> Option<f64> {
    quantile_linear(values, 0.5)
}

/// Median absolute deviation from the median.
pub fn median_abs_deviation(values: &[f64]) -> Option<f64> {
    let med = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    median(&deviations)
}

/// Pearson correlation between two equal-length samples.
///
/// Returns None when either side has zero variance or fewer than two points.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        let dx = x - mx;
        let dy = y - my;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}
