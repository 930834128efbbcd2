//! Numeric feature scaling.

use polars::prelude::*;
use std::time::Instant;

use crate::config::{ScalingMethod, StageKind};
use crate::error::Result;
use crate::metrics::StageMetrics;
use crate::stages::StageContext;
use crate::utils;

/// Rescale every numeric, non-excluded column in place.
///
/// Standard scaling uses population statistics; a zero-spread column gets a
/// unit scale so it centers without dividing by zero, matching the usual
/// scaler convention.
pub fn scale(
    mut df: DataFrame,
    method: ScalingMethod,
    skip: &[String],
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
        if ctx.is_protected(&name) || skip.iter().any(|c| c == &name) {
            continue;
        }
        let series = df.column(&name)?.as_materialized_series().clone();
        if !utils::is_numeric_dtype(series.dtype()) {
            continue;
        }

        let values = utils::numeric_values(&series)?;
        let Some((offset, scale)) = scaling_params(method, &values) else {
            ctx.warn(
                StageKind::Scaling,
                format!("no values to scale in '{}', skipped", name),
            );
            continue;
        };

        let ca = series.cast(&DataType::Float64)?;
        let ca = ca.f64()?;
        let scaled: Vec<Option<f64>> = ca
            .into_iter()
            .map(|v| v.map(|v| (v - offset) / scale))
            .collect();
        df.replace(&name, Series::new(series.name().clone(), scaled))?;
        metrics.columns_converted += 1;
        ctx.info(StageKind::Scaling, format!("scaled '{}' ({:?})", name, method));
    }

    metrics.duration = start.elapsed();
    Ok((df, metrics))
}

/// (offset, scale) such that scaled = (x - offset) / scale. A degenerate
/// spread yields scale 1.
fn scaling_params(method: ScalingMethod, values: &[f64]) -> Option<(f64, f64)> {
    match method {
        ScalingMethod::Standard => {
            let m = utils::mean(values)?;
            let std = utils::population_std(values)?;
            let scale = if std == 0.0 { 1.0 } else { std };
            Some((m, scale))
        }
        ScalingMethod::Minmax => {
            if values.is_empty() {
                return None;
            }
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let range = max - min;
            let scale = if range == 0.0 { 1.0 } else { range };
            Some((min, scale))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::stages::test_support::silent_ctx;

    fn column_values(df: &DataFrame, name: &str) -> Vec<f64> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect()
    }

    #[test]
    fn test_standard_scaling_zero_mean_unit_std() {
        let df = df! { "x" => &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] }.unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        // mean 5, population std 2
        let (out, _) = scale(df, ScalingMethod::Standard, &[], &ctx).unwrap();
        let values = column_values(&out, "x");
        assert_eq!(values[0], -1.5);
        assert_eq!(values[7], 2.0);

        let sum: f64 = values.iter().sum();
        assert!(sum.abs() < 1e-12);
    }

    #[test]
    fn test_minmax_scaling_to_unit_range() {
        let df = df! { "x" => &[10.0, 20.0, 30.0] }.unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let (out, _) = scale(df, ScalingMethod::Minmax, &[], &ctx).unwrap();
        assert_eq!(column_values(&out, "x"), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_constant_column_gets_unit_scale() {
        let df = df! { "x" => &[7.0, 7.0, 7.0] }.unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let (std_out, _) = scale(df.clone(), ScalingMethod::Standard, &[], &ctx).unwrap();
        assert_eq!(column_values(&std_out, "x"), vec![0.0, 0.0, 0.0]);

        let (mm_out, _) = scale(df, ScalingMethod::Minmax, &[], &ctx).unwrap();
        assert_eq!(column_values(&mm_out, "x"), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_nulls_preserved() {
        let df = df! { "x" => &[Some(10.0), None, Some(30.0)] }.unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let (out, _) = scale(df, ScalingMethod::Minmax, &[], &ctx).unwrap();
        let col = out.column("x").unwrap();
        assert_eq!(col.null_count(), 1);
    }

    #[test]
    fn test_skip_list_honored() {
        let df = df! {
            "x" => &[10.0, 20.0],
            "y" => &[10.0, 20.0],
        }
        .unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let skip = vec!["y".to_string()];
        let (out, metrics) = scale(df, ScalingMethod::Minmax, &skip, &ctx).unwrap();
        assert_eq!(column_values(&out, "x"), vec![0.0, 1.0]);
        assert_eq!(column_values(&out, "y"), vec![10.0, 20.0]);
        assert_eq!(metrics.columns_converted, 1);
    }

    #[test]
    fn test_text_columns_untouched() {
        let df = df! { "tag" => &["a", "b"] }.unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let (out, metrics) = scale(df, ScalingMethod::Standard, &[], &ctx).unwrap();
        assert_eq!(out.column("tag").unwrap().dtype(), &DataType::String);
        assert_eq!(metrics.columns_converted, 0);
    }
}
