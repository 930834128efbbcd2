//! Variance and correlation based feature pruning.

use polars::prelude::*;
use std::collections::HashSet;
use std::time::Instant;

use crate::config::StageKind;
use crate::error::Result;
use crate::metrics::StageMetrics;
use crate::stages::StageContext;
use crate::utils;

/// Drop numeric columns with near-zero variance, then the later column of
/// every highly correlated pair (upper-triangular scan in column order).
pub fn select_features(
    mut df: DataFrame,
    variance_threshold: f64,
    correlation_threshold: f64,
    ctx: &StageContext<'_>,
) -> Result<(DataFrame, StageMetrics)> {
    let start = Instant::now();
    let mut metrics = StageMetrics::default();

    let numeric: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|col| {
            utils::is_numeric_dtype(col.dtype()) && !ctx.is_protected(col.name().as_str())
        })
        .map(|col| col.name().to_string())
        .collect();

    // pass 1: variance floor
    let mut survivors: Vec<String> = Vec::with_capacity(numeric.len());
    for name in &numeric {
        let series = df.column(name)?.as_materialized_series().clone();
        let values = utils::numeric_values(&series)?;
        let variance = utils::population_variance(&values).unwrap_or(0.0);
        if variance <= variance_threshold {
            df.drop_in_place(name)?;
            metrics.columns_dropped += 1;
            ctx.info(
                StageKind::FeatureSelection,
                format!("dropped '{}' (variance {:.6})", name, variance),
            );
        } else {
            survivors.push(name.clone());
        }
    }

    // pass 2: pairwise correlation, later column of a flagged pair goes
    let columns: Vec<Vec<Option<f64>>> = survivors
        .iter()
        .map(|name| -> Result<Vec<Option<f64>>> {
            let casted = df
                .column(name)?
                .as_materialized_series()
                .cast(&DataType::Float64)?;
            Ok(casted.f64()?.into_iter().collect())
        })
        .collect::<Result<_>>()?;

    let mut to_drop: HashSet<usize> = HashSet::new();
    for i in 0..survivors.len() {
        for j in (i + 1)..survivors.len() {
            if to_drop.contains(&j) {
                continue;
            }
            let (xs, ys) = paired_values(&columns[i], &columns[j]);
            if let Some(r) = utils::pearson_correlation(&xs, &ys) {
                if r.abs() > correlation_threshold {
                    to_drop.insert(j);
                    ctx.info(
                        StageKind::FeatureSelection,
                        format!(
                            "dropped '{}' (|corr| {:.3} with '{}')",
                            survivors[j],
                            r.abs(),
                            survivors[i]
                        ),
                    );
                }
            }
        }
    }
    for idx in &to_drop {
        df.drop_in_place(&survivors[*idx])?;
        metrics.columns_dropped += 1;
    }

    metrics.duration = start.elapsed();
    Ok((df, metrics))
}

/// Rows where both sides are present, order preserved.
fn paired_values(a: &[Option<f64>], b: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    let mut xs = Vec::with_capacity(a.len());
    let mut ys = Vec::with_capacity(b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        if let (Some(x), Some(y)) = (x, y) {
            xs.push(*x);
            ys.push(*y);
        }
    }
    (xs, ys)
}
