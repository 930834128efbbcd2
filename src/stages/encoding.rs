//! Categorical encoding over auto-detected text columns.

use polars::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use crate::config::{EncodingMethod, StageKind};
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::pipeline::target::KeyedTarget;
use crate::stages::StageContext;
use crate::utils;

/// Encode every non-excluded text column with the configured method.
///
/// `target` is required for [`EncodingMethod::Target`] and ignored by the
/// other methods. A per-column failure leaves that column as-is.
pub fn encode(
    mut df: DataFrame,
    method: EncodingMethod,
    target: Option<&KeyedTarget>,
    ctx: &StageContext<'_>,
) -> Result<(DataFrame, StageMetrics)> {
    let start = Instant::now();
    let mut metrics = StageMetrics::default();

    // target means are keyed by row position, fixed for the whole stage
    // since encoding never adds or removes rows
    let aligned_target: Option<Vec<Option<f64>>> = match method {
        EncodingMethod::Target => {
            let target = target.ok_or(PipelineError::MissingTarget)?;
            let aligned = target.aligned_to(&df)?.cast(&DataType::Float64)?;
            Some(aligned.f64()?.into_iter().collect())
        }
        _ => None,
    };

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();

    for name in names {
        if ctx.is_protected(&name) {
            continue;
        }
        let series = df.column(&name)?.as_materialized_series().clone();
        if !utils::is_string_dtype(series.dtype()) {
            continue;
        }
        // categoricals encode through their string representation
        let series = series.cast(&DataType::String)?;

        let outcome = match method {
            EncodingMethod::Label => encode_label(&mut df, &series),
            EncodingMethod::Onehot => encode_onehot(&mut df, &series),
            EncodingMethod::Target => encode_target(
                &mut df,
                &series,
                aligned_target.as_deref().unwrap_or_default(),
            ),
        };

        match outcome {
            Ok((dropped, added)) => {
                metrics.columns_dropped += dropped;
                metrics.columns_added += added;
                ctx.info(
                    StageKind::Encoding,
                    format!("encoded '{}' ({:?})", name, method),
                );
            }
            Err(e) => {
                ctx.warn(
                    StageKind::Encoding,
                    format!("failed to encode '{}', left unchanged: {}", name, e),
                );
            }
        }
    }

    metrics.duration = start.elapsed();
    Ok((df, metrics))
}

/// Sorted-distinct values mapped to integer codes; nulls stay null.
fn encode_label(df: &mut DataFrame, series: &Series) -> Result<(usize, usize)> {
    let ca = series.str()?;
    let distinct: BTreeSet<&str> = ca.into_iter().flatten().collect();
    let codes: HashMap<&str, i32> = distinct
        .into_iter()
        .enumerate()
        .map(|(code, value)| (value, code as i32))
        .collect();

    let encoded: Vec<Option<i32>> = ca
        .into_iter()
        .map(|v| v.and_then(|s| codes.get(s).copied()))
        .collect();
    df.replace(
        series.name().as_str(),
        Series::new(series.name().clone(), encoded),
    )?;
    Ok((0, 0))
}

/// One 0/1 indicator column per distinct value, named `{col}_{value}`.
/// The original column is dropped; null rows are zero in every indicator.
fn encode_onehot(df: &mut DataFrame, series: &Series) -> Result<(usize, usize)> {
    let ca = series.str()?;
    let distinct: BTreeSet<&str> = ca.into_iter().flatten().collect();

    let mut indicators = Vec::with_capacity(distinct.len());
    for value in &distinct {
        let flags: Vec<i32> = ca
            .into_iter()
            .map(|v| i32::from(v == Some(*value)))
            .collect();
        let col_name = format!("{}_{}", series.name(), value);
        indicators.push(Series::new(col_name.as_str().into(), flags));
    }

    df.drop_in_place(series.name().as_str())?;
    let added = indicators.len();
    for indicator in indicators {
        df.with_column(indicator)?;
    }
    Ok((1, added))
}

/// Each category replaced by the mean target value of its rows. A category
/// whose rows carry no target values encodes as null.
fn encode_target(
    df: &mut DataFrame,
    series: &Series,
    aligned_target: &[Option<f64>],
) -> Result<(usize, usize)> {
    let ca = series.str()?;

    let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
    for (value, target) in ca.into_iter().zip(aligned_target.iter()) {
        if let (Some(value), Some(target)) = (value, target) {
            let entry = sums.entry(value).or_insert((0.0, 0));
            entry.0 += target;
            entry.1 += 1;
        }
    }
    let means: HashMap<&str, f64> = sums
        .into_iter()
        .map(|(value, (sum, count))| (value, sum / count as f64))
        .collect();

    let encoded: Vec<Option<f64>> = ca
        .into_iter()
        .map(|v| v.and_then(|s| means.get(s).copied()))
        .collect();
    df.replace(
        series.name().as_str(),
        Series::new(series.name().clone(), encoded),
    )?;
    Ok((0, 0))
}
