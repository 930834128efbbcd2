//! Temporal decomposition of datetime and time-only columns.

use chrono::{Datelike, Timelike};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::time::Instant;

use crate::config::StageKind;
use crate::error::Result;
use crate::metrics::StageMetrics;
use crate::stages::StageContext;
use crate::utils;

/// Strict `HH:MM:SS` values, seconds required.
static HMS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}:\d{2}:\d{2}$").expect("valid regex"));

/// Replace each datetime column with year/month/day/hour/minute/second/
/// weekday sub-columns, and each strict `HH:MM:SS` text column with
/// hour/minute/second. Weekday is Monday-based, 0 through 6.
pub fn extract_temporal(
    mut df: DataFrame,
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
        let series = df.column(&name)?.as_materialized_series().clone();

        if utils::is_datetime_dtype(series.dtype()) {
            let (dropped, added) = expand_datetime(&mut df, &series)?;
            metrics.columns_dropped += dropped;
            metrics.columns_added += added;
            ctx.info(
                StageKind::TemporalFeatures,
                format!("expanded datetime column '{}'", name),
            );
            continue;
        }

        if matches!(series.dtype(), DataType::String) && is_time_only_column(&series)? {
            let (dropped, added) = expand_time_only(&mut df, &series)?;
            metrics.columns_dropped += dropped;
            metrics.columns_added += added;
            ctx.info(
                StageKind::TemporalFeatures,
                format!("expanded time column '{}'", name),
            );
        }
    }

    metrics.duration = start.elapsed();
    Ok((df, metrics))
}

/// Every non-null value is a strict `HH:MM:SS`, and there is at least one.
fn is_time_only_column(series: &Series) -> Result<bool> {
    let ca = series.str()?;
    let mut any = false;
    for value in ca.into_iter().flatten() {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !HMS_RE.is_match(trimmed) {
            return Ok(false);
        }
        any = true;
    }
    Ok(any)
}

fn expand_datetime(df: &mut DataFrame, series: &Series) -> Result<(usize, usize)> {
    let millis = series
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        .cast(&DataType::Int64)?;
    let millis = millis.i64()?;

    let parts: Vec<Option<chrono::NaiveDateTime>> = millis
        .into_iter()
        .map(|ms| ms.and_then(|ms| chrono::DateTime::from_timestamp_millis(ms))
            .map(|dt| dt.naive_utc()))
        .collect();

    let name = series.name().to_string();
    let features: [(&str, fn(&chrono::NaiveDateTime) -> i32); 7] = [
        ("year", |dt| dt.year()),
        ("month", |dt| dt.month() as i32),
        ("day", |dt| dt.day() as i32),
        ("hour", |dt| dt.hour() as i32),
        ("minute", |dt| dt.minute() as i32),
        ("second", |dt| dt.second() as i32),
        ("weekday", |dt| dt.weekday().num_days_from_monday() as i32),
    ];

    df.drop_in_place(&name)?;
    for (suffix, extract) in features {
        let values: Vec<Option<i32>> = parts.iter().map(|dt| dt.as_ref().map(extract)).collect();
        let col_name = format!("{}_{}", name, suffix);
        df.with_column(Series::new(col_name.as_str().into(), values))?;
    }
    Ok((1, 7))
}

fn expand_time_only(df: &mut DataFrame, series: &Series) -> Result<(usize, usize)> {
    let ca = series.str()?;

    let parts: Vec<Option<(i32, i32, i32)>> = ca
        .into_iter()
        .map(|v| v.and_then(parse_hms))
        .collect();

    let name = series.name().to_string();
    df.drop_in_place(&name)?;
    for (suffix, pick) in [
        ("hour", 0usize),
        ("minute", 1),
        ("second", 2),
    ] {
        let values: Vec<Option<i32>> = parts
            .iter()
            .map(|p| p.map(|(h, m, s)| [h, m, s][pick]))
            .collect();
        let col_name = format!("{}_{}", name, suffix);
        df.with_column(Series::new(col_name.as_str().into(), values))?;
    }
    Ok((1, 3))
}

fn parse_hms(value: &str) -> Option<(i32, i32, i32)> {
    let trimmed = value.trim();
    if !HMS_RE.is_match(trimmed) {
        return None;
    }
    let mut parts = trimmed.split(':');
    let h = parts.next()?.parse().ok()?;
    let m = parts.next()?.parse().ok()?;
    let s = parts.next()?.parse().ok()?;
    Some((h, m, s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::stages::test_support::silent_ctx;
    use chrono::NaiveDate;

    fn datetime_frame() -> DataFrame {
        // Wed 2023-06-14 08:30:45 and Sun 2023-12-31 23:59:59
        let millis: Vec<Option<i64>> = vec![
            Some(
                NaiveDate::from_ymd_opt(2023, 6, 14)
                    .unwrap()
                    .and_hms_opt(8, 30, 45)
                    .unwrap()
                    .and_utc()
                    .timestamp_millis(),
            ),
            Some(
                NaiveDate::from_ymd_opt(2023, 12, 31)
                    .unwrap()
                    .and_hms_opt(23, 59, 59)
                    .unwrap()
                    .and_utc()
                    .timestamp_millis(),
            ),
            None,
        ];
        let series = Series::new("event_date".into(), millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();
        DataFrame::new(vec![series.into_column()]).unwrap()
    }

    fn i32_values(df: &DataFrame, name: &str) -> Vec<Option<i32>> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .i32()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_datetime_column_expanded() {
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let (out, metrics) = extract_temporal(datetime_frame(), &ctx).unwrap();
        assert!(out.column("event_date").is_err());
        assert_eq!(metrics.columns_dropped, 1);
        assert_eq!(metrics.columns_added, 7);

        assert_eq!(i32_values(&out, "event_date_year"), vec![Some(2023), Some(2023), None]);
        assert_eq!(i32_values(&out, "event_date_month"), vec![Some(6), Some(12), None]);
        assert_eq!(i32_values(&out, "event_date_day"), vec![Some(14), Some(31), None]);
        assert_eq!(i32_values(&out, "event_date_hour"), vec![Some(8), Some(23), None]);
        assert_eq!(i32_values(&out, "event_date_minute"), vec![Some(30), Some(59), None]);
        assert_eq!(i32_values(&out, "event_date_second"), vec![Some(45), Some(59), None]);
        // Monday-based weekday: Wednesday=2, Sunday=6
        assert_eq!(i32_values(&out, "event_date_weekday"), vec![Some(2), Some(6), None]);
    }

    #[test]
    fn test_strict_time_text_expanded() {
        let df = df! {
            "start" => &[Some("08:30:45"), Some("23:05:01"), None],
        }
        .unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let (out, metrics) = extract_temporal(df, &ctx).unwrap();
        assert!(out.column("start").is_err());
        assert_eq!(metrics.columns_added, 3);
        assert_eq!(i32_values(&out, "start_hour"), vec![Some(8), Some(23), None]);
        assert_eq!(i32_values(&out, "start_minute"), vec![Some(30), Some(5), None]);
        assert_eq!(i32_values(&out, "start_second"), vec![Some(45), Some(1), None]);
    }

    #[test]
    fn test_hh_mm_without_seconds_not_expanded() {
        let df = df! { "t" => &["08:30", "09:45"] }.unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let (out, metrics) = extract_temporal(df, &ctx).unwrap();
        assert!(out.column("t").is_ok());
        assert_eq!(metrics.columns_added, 0);
    }

    #[test]
    fn test_mixed_text_column_untouched() {
        let df = df! { "t" => &["08:30:45", "lunch"] }.unwrap();
        let sink = MemorySink::new();
        let ctx = silent_ctx(&sink);

        let (out, _) = extract_temporal(df, &ctx).unwrap();
        assert!(out.column("t").is_ok());
        assert_eq!(out.column("t").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_protected_datetime_column_untouched() {
        let sink = MemorySink::new();
        let keep = vec!["event_date".to_string()];
        let ctx = StageContext::new(&sink, &keep);

        let (out, metrics) = extract_temporal(datetime_frame(), &ctx).unwrap();
        assert!(out.column("event_date").is_ok());
        assert_eq!(metrics.columns_dropped, 0);
    }
}
