//! Null handling: impute heavily-missing columns, drop sparsely-missing rows.
//!
//! Columns are processed sequentially in frame order, so rows dropped for an
//! earlier column change the missingness ratio seen by later ones.

use polars::prelude::*;
use std::time::Instant;

use crate::config::StageKind;
use crate::error::Result;
use crate::metrics::StageMetrics;
use crate::stages::StageContext;
use crate::utils;

/// Resolve nulls column by column.
///
/// A column whose missingness ratio is at or above `threshold` has its nulls
/// imputed (mean for numeric, mode for text); below the threshold the rows
/// holding the nulls are dropped instead.
pub fn handle_nulls(
    mut df: DataFrame,
    threshold: f64,
    ctx: &StageContext<'_>,
) -> Result<(DataFrame, StageMetrics)> {
    let start = Instant::now();
    let mut metrics = StageMetrics::default();

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();

    for name in names {
        if ctx.is_protected(&name) {
            continue;
        }
        if df.height() == 0 {
            break;
        }

        let series = df.column(&name)?.as_materialized_series().clone();
        let null_count = series.null_count();
        if null_count == 0 {
            continue;
        }
        let ratio = null_count as f64 / df.height() as f64;

        if ratio >= threshold {
            match impute_series(&series) {
                Some(filled) => {
                    df.replace(&name, filled)?;
                    metrics.cells_imputed += null_count;
                    ctx.info(
                        StageKind::HandleNulls,
                        format!(
                            "imputed {} nulls in '{}' ({:.1}% missing)",
                            null_count,
                            name,
                            ratio * 100.0
                        ),
                    );
                }
                None => {
                    ctx.warn(
                        StageKind::HandleNulls,
                        format!("no fill value derivable for '{}', left unchanged", name),
                    );
                }
            }
            continue;
        }

        let before = df.height();
        let mask = series.is_not_null();
        df = df.filter(&mask)?;
        let dropped = before - df.height();
        metrics.rows_dropped += dropped;
        ctx.info(
            StageKind::HandleNulls,
            format!("dropped {} rows with nulls in '{}'", dropped, name),
        );
    }

    metrics.duration = start.elapsed();
    Ok((df, metrics))
}

/// Fill nulls with the column mean (numeric) or mode (text, boolean,
/// categorical). An entirely missing text column falls back to empty
/// strings. Returns None when there are no values to derive a fill from,
/// or the dtype has no sensible fill.
fn impute_series(series: &Series) -> Option<Series> {
    if utils::is_numeric_dtype(series.dtype()) {
        let values = utils::numeric_values(series).ok()?;
        let fill = utils::mean(&values)?;
        let casted = series.cast(&DataType::Float64).ok()?;
        let ca = casted.f64().ok()?;
        let filled: Vec<f64> = ca.into_iter().map(|v| v.unwrap_or(fill)).collect();
        return Some(Series::new(series.name().clone(), filled));
    }

    if matches!(series.dtype(), DataType::String) {
        let fill = utils::string_mode(series).unwrap_or_default();
        let ca = series.str().ok()?;
        let filled: Vec<&str> = ca
            .into_iter()
            .map(|v| v.unwrap_or(fill.as_str()))
            .collect();
        return Some(Series::new(series.name().clone(), filled));
    }

    if matches!(series.dtype(), DataType::Boolean) {
        let ca = series.bool().ok()?;
        let trues = ca.into_iter().flatten().filter(|v| *v).count();
        let falses = ca.into_iter().flatten().filter(|v| !*v).count();
        if trues + falses == 0 {
            return None;
        }
        let fill = trues > falses;
        let filled: Vec<bool> = ca.into_iter().map(|v| v.unwrap_or(fill)).collect();
        return Some(Series::new(series.name().clone(), filled));
    }

    if matches!(series.dtype(), DataType::Categorical(_, _)) {
        // fill through the string representation, then restore the dtype
        let as_string = series.cast(&DataType::String).ok()?;
        let filled = impute_series(&as_string)?;
        return filled.cast(series.dtype()).ok();
    }

    None
}
