//! Statistical outlier handling over numeric columns.
//!
//! Bounds use strict inequalities: a value exactly on a bound is not an
//! outlier. In drop mode columns are processed in frame order against the
//! already-shrunk table, so an earlier column's drops change the bounds
//! later columns see. Cap mode leaves the row count unchanged and is
//! idempotent for a fixed method and parameter.

use polars::prelude::*;
use std::time::Instant;

use crate::config::{OutlierMethod, StageKind};
use crate::error::Result;
use crate::metrics::StageMetrics;
use crate::stages::StageContext;
use crate::utils;

const DEFAULT_IQR_K: f64 = 1.5;
const DEFAULT_ZSCORE_T: f64 = 3.0;
const DEFAULT_MODIFIED_Z: f64 = 3.5;

/// Scale factor relating the MAD to the standard deviation of a normal
/// distribution; the modified Z-score is 0.6745*(x - median)/MAD.
const MAD_CONSISTENCY: f64 = 0.6745;

/// Applies one bound method and one drop-or-cap action per run.
#[derive(Debug, Clone)]
pub struct OutlierHandler {
    method: OutlierMethod,
    param: Option<f64>,
    drop: bool,
}

impl OutlierHandler {
    pub fn new(method: OutlierMethod, param: Option<f64>, drop: bool) -> Self {
        Self {
            method,
            param,
            drop,
        }
    }

    /// Lower/upper bounds for one column's values, or None when the method
    /// is undefined for the data (zero spread, empty column).
    fn bounds(&self, values: &[f64]) -> Option<(f64, f64)> {
        if values.is_empty() {
            return None;
        }
        match self.method {
            OutlierMethod::Iqr => {
                let k = self.param.unwrap_or(DEFAULT_IQR_K);
                let q1 = utils::quantile_linear(values, 0.25)?;
                let q3 = utils::quantile_linear(values, 0.75)?;
                let iqr = q3 - q1;
                Some((q1 - k * iqr, q3 + k * iqr))
            }
            OutlierMethod::Zscore => {
                let t = self.param.unwrap_or(DEFAULT_ZSCORE_T);
                let m = utils::mean(values)?;
                let std = utils::population_std(values)?;
                if std == 0.0 {
                    return None;
                }
                Some((m - t * std, m + t * std))
            }
            OutlierMethod::ModifiedZscore => {
                let threshold = self.param.unwrap_or(DEFAULT_MODIFIED_Z);
                let med = utils::median(values)?;
                let mad = utils::median_abs_deviation(values)?;
                if mad == 0.0 {
                    return None;
                }
                let spread = threshold * mad / MAD_CONSISTENCY;
                Some((med - spread, med + spread))
            }
        }
    }

    /// Process every numeric, non-excluded column. Returns the transformed
    /// frame plus metrics; `rows_dropped` or `cells_capped` carries the
    /// per-run outlier total depending on mode.
    pub fn handle(
        &self,
        mut df: DataFrame,
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
            if df.height() == 0 {
                break;
            }

            let series = df.column(&name)?.as_materialized_series().clone();
            if !utils::is_numeric_dtype(series.dtype()) {
                continue;
            }

            let values = utils::numeric_values(&series)?;
            let Some((lower, upper)) = self.bounds(&values) else {
                ctx.info(
                    StageKind::HandleOutliers,
                    format!("no usable bounds for '{}', skipped", name),
                );
                continue;
            };

            if self.drop {
                let ca = series.cast(&DataType::Float64)?;
                let ca = ca.f64()?;
                let keep: Vec<bool> = ca
                    .into_iter()
                    .map(|v| match v {
                        // nulls are not outliers
                        None => true,
                        Some(v) => v >= lower && v <= upper,
                    })
                    .collect();
                let flagged = keep.iter().filter(|k| !**k).count();
                if flagged == 0 {
                    continue;
                }
                let mask = BooleanChunked::from_slice("mask".into(), &keep);
                let before = df.height();
                df = df.filter(&mask)?;
                metrics.rows_dropped += before - df.height();
                ctx.info(
                    StageKind::HandleOutliers,
                    format!(
                        "dropped {} rows outside [{:.4}, {:.4}] in '{}'",
                        flagged, lower, upper, name
                    ),
                );
            } else {
                let ca = series.cast(&DataType::Float64)?;
                let ca = ca.f64()?;
                let mut capped = 0usize;
                let clamped: Vec<Option<f64>> = ca
                    .into_iter()
                    .map(|v| {
                        v.map(|v| {
                            if v < lower {
                                capped += 1;
                                lower
                            } else if v > upper {
                                capped += 1;
                                upper
                            } else {
                                v
                            }
                        })
                    })
                    .collect();
                if capped == 0 {
                    continue;
                }
                df.replace(&name, Series::new(series.name().clone(), clamped))?;
                metrics.cells_capped += capped;
                ctx.info(
                    StageKind::HandleOutliers,
                    format!(
                        "capped {} values to [{:.4}, {:.4}] in '{}'",
                        capped, lower, upper, name
                    ),
                );
            }
        }

        metrics.duration = start.elapsed();
        Ok((df, metrics))
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
            .cast(&DataType::Float64)
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect()
    }

    #[test]
    fn test_iqr_drops_extreme_value() {
        // x: [1..9, 1000]; Q1=3.25, Q3=7.75, IQR=4.5, upper=14.5
        let mut values: Vec<f64> = (1..=9).map(|v| v as f64).collect();
        values.push(1000.0);
        let df = df! { "x" => values }.unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let handler = OutlierHandler::new(OutlierMethod::Iqr, None, true);
        let (out, metrics) = handler.handle(df, &[], &ctx).unwrap();
        assert_eq!(out.height(), 9);
        assert_eq!(metrics.rows_dropped, 1);
    }

    #[test]
    fn test_boundary_value_not_flagged() {
        // [1,2,3,4]: Q1=1.75, Q3=3.25, IQR=1.5, bounds [-0.5, 5.5];
        // a value exactly at 5.5 must survive the strict inequality
        let df = df! { "x" => &[1.0, 2.0, 3.0, 4.0, 5.5] }.unwrap();
        // recompute with the 5th point: Q1=2.0, Q3=4.0, bounds [-1.0, 7.0]
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let handler = OutlierHandler::new(OutlierMethod::Iqr, None, true);
        let (out, metrics) = handler.handle(df, &[], &ctx).unwrap();
        assert_eq!(out.height(), 5);
        assert_eq!(metrics.rows_dropped, 0);
    }

    #[test]
    fn test_zscore_zero_std_flags_nothing() {
        let df = df! { "x" => &[5.0, 5.0, 5.0, 5.0] }.unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let handler = OutlierHandler::new(OutlierMethod::Zscore, None, true);
        let (out, metrics) = handler.handle(df, &[], &ctx).unwrap();
        assert_eq!(out.height(), 4);
        assert_eq!(metrics.rows_dropped, 0);
    }

    #[test]
    fn test_modified_zscore_zero_mad_flags_nothing() {
        // MAD is 0 when more than half the values equal the median
        let df = df! { "x" => &[5.0, 5.0, 5.0, 5.0, 100.0] }.unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let handler = OutlierHandler::new(OutlierMethod::ModifiedZscore, None, true);
        let (out, metrics) = handler.handle(df, &[], &ctx).unwrap();
        assert_eq!(out.height(), 5);
        assert_eq!(metrics.rows_dropped, 0);
    }

    #[test]
    fn test_modified_zscore_drops_extreme() {
        let df = df! {
            "x" => &[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 500.0],
        }
        .unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let handler = OutlierHandler::new(OutlierMethod::ModifiedZscore, None, true);
        let (out, metrics) = handler.handle(df, &[], &ctx).unwrap();
        assert_eq!(out.height(), 7);
        assert_eq!(metrics.rows_dropped, 1);
    }

    #[test]
    fn test_cap_mode_preserves_row_count_and_is_idempotent() {
        let mut values: Vec<f64> = (1..=9).map(|v| v as f64).collect();
        values.push(1000.0);
        let df = df! { "x" => values }.unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let handler = OutlierHandler::new(OutlierMethod::Iqr, None, false);
        let (out, metrics) = handler.handle(df, &[], &ctx).unwrap();
        assert_eq!(out.height(), 10);
        assert_eq!(metrics.cells_capped, 1);
        let capped = column_values(&out, "x");
        assert!(capped[9] < 1000.0);

        // second pass: everything already inside the recomputed bounds
        let (again, metrics2) = handler.handle(out.clone(), &[], &ctx).unwrap();
        assert_eq!(metrics2.cells_capped, 0);
        assert_eq!(column_values(&again, "x"), capped);
    }

    #[test]
    fn test_drop_is_cumulative_across_columns() {
        // y's extreme sits in the row x already drops, so y sees a clean
        // column and drops nothing further
        let df = df! {
            "x" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 1000.0],
            "y" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 2000.0],
        }
        .unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let handler = OutlierHandler::new(OutlierMethod::Iqr, None, true);
        let (out, metrics) = handler.handle(df, &[], &ctx).unwrap();
        assert_eq!(out.height(), 9);
        assert_eq!(metrics.rows_dropped, 1);
    }

    #[test]
    fn test_skip_list_and_non_numeric_untouched() {
        let mut values: Vec<f64> = (1..=9).map(|v| v as f64).collect();
        values.push(1000.0);
        let df = df! {
            "x" => values,
            "label" => &["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"],
        }
        .unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let handler = OutlierHandler::new(OutlierMethod::Iqr, None, true);
        let skip = vec!["x".to_string()];
        let (out, metrics) = handler.handle(df, &skip, &ctx).unwrap();
        assert_eq!(out.height(), 10);
        assert_eq!(metrics.rows_dropped, 0);
    }

    #[test]
    fn test_nulls_are_not_outliers() {
        let df = df! {
            "x" => &[Some(1.0), Some(2.0), Some(3.0), None, Some(4.0)],
        }
        .unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let handler = OutlierHandler::new(OutlierMethod::Iqr, None, true);
        let (out, _) = handler.handle(df, &[], &ctx).unwrap();
        assert_eq!(out.height(), 5);
    }

    #[test]
    fn test_zscore_param_override() {
        // tighter t drops more than the default
        let df = df! {
            "x" => &[10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 20.0],
        }
        .unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let handler = OutlierHandler::new(OutlierMethod::Zscore, Some(1.0), true);
        let (out, metrics) = handler.handle(df, &[], &ctx).unwrap();
        assert_eq!(metrics.rows_dropped, 1);
        assert_eq!(out.height(), 9);
    }
}
