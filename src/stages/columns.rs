//! Column removal stages: the manual drop list and all-null columns.

use polars::prelude::*;
use std::time::Instant;

use crate::config::StageKind;
use crate::error::Result;
use crate::metrics::StageMetrics;
use crate::stages::StageContext;

/// Drop the columns the caller named. Unknown and protected names are
/// reported and skipped rather than failing the run.
pub fn remove_manual_columns(
    mut df: DataFrame,
    manual: &[String],
    ctx: &StageContext<'_>,
) -> Result<(DataFrame, StageMetrics)> {
    let start = Instant::now();
    let mut metrics = StageMetrics::default();

    for name in manual {
        if df.column(name).is_err() {
            ctx.warn(
                StageKind::ManualColumns,
                format!("column '{}' not found, skipping", name),
            );
            continue;
        }
        if ctx.is_protected(name) {
            ctx.warn(
                StageKind::ManualColumns,
                format!("column '{}' is protected, skipping", name),
            );
            continue;
        }
        df.drop_in_place(name)?;
        metrics.columns_dropped += 1;
        ctx.info(StageKind::ManualColumns, format!("dropped column '{}'", name));
    }

    metrics.duration = start.elapsed();
    Ok((df, metrics))
}

/// Drop every column whose values are all null. A zero-row frame is left
/// untouched so an empty load does not wipe the schema.
pub fn drop_empty_columns(
    mut df: DataFrame,
    ctx: &StageContext<'_>,
) -> Result<(DataFrame, StageMetrics)> {
    let start = Instant::now();
    let mut metrics = StageMetrics::default();

    if df.height() == 0 {
        metrics.duration = start.elapsed();
        return Ok((df, metrics));
    }

    let height = df.height();
    let empty: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|col| col.null_count() == height && !ctx.is_protected(col.name().as_str()))
        .map(|col| col.name().to_string())
        .collect();

    for name in &empty {
        df.drop_in_place(name)?;
        metrics.columns_dropped += 1;
        ctx.info(
            StageKind::DropEmptyColumns,
            format!("dropped all-null column '{}'", name),
        );
    }

    metrics.duration = start.elapsed();
    Ok((df, metrics))
}
