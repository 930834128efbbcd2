//! Heuristic dtype finalization for textual columns.
//!
//! Each string column gets a strict numeric attempt first, then a datetime
//! attempt gated by name and content hints, and otherwise stays text. The
//! datetime heuristics are deliberately conservative: a column converts only
//! when its name suggests a date and most values parse, or when nearly every
//! value parses regardless of name.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::time::Instant;

use crate::config::StageKind;
use crate::error::Result;
use crate::metrics::StageMetrics;
use crate::stages::StageContext;
use crate::utils;

/// Column-name tokens that suggest date/time content.
const DATEISH_TOKENS: [&str; 7] = [
    "date", "time", "timestamp", "created", "updated", "modified", "dob",
];

/// `D[-/.]D[-/.]D` shaped values, optionally followed by a time part.
static DATE_SHAPED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,4}[-/.]\d{1,2}[-/.]\d{1,4}([T ].+)?$").expect("valid regex")
});

/// Month-name date forms: "15 January 2023", "Jan 15, 2023".
static MONTH_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:\d{1,2}\s+)?(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?,?\s+\d{1,4}(?:,?\s+\d{2,4})?$",
    )
    .expect("valid regex")
});

/// Bare `HH:MM` or `HH:MM:SS` values with no date part.
static TIME_ONLY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}:\d{2}(?::\d{2})?$").expect("valid regex"));

const DAY_FIRST_FORMATS: [&str; 5] = ["%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y", "%d-%m-%y", "%d/%m/%y"];
const MONTH_FIRST_FORMATS: [&str; 5] =
    ["%m-%d-%Y", "%m/%d/%Y", "%m.%d.%Y", "%m-%d-%y", "%m/%d/%y"];
const UNAMBIGUOUS_FORMATS: [&str; 9] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
];

/// Named thresholds for the datetime heuristics, so boundary behavior can
/// be probed precisely instead of living in inline literals.
#[derive(Debug, Clone)]
pub struct DatetimePolicy {
    /// Values sampled per column for pattern ratios.
    pub sample_size: usize,
    /// Time-only ratio at or above which the column is left for the
    /// temporal stage's own detector.
    pub time_only_ratio: f64,
    /// Date-shaped ratio below which a time-only column is considered
    /// truly time-only.
    pub time_only_date_ceiling: f64,
    /// Date-shaped ratio below which a column without a name hint is not
    /// worth a full parse attempt.
    pub unnamed_date_floor: f64,
    /// Parse ratio at or above which a name-hinted column converts.
    pub named_convert_ratio: f64,
    /// Parse ratio at or above which any column converts, name or not.
    pub unnamed_convert_ratio: f64,
    /// Day-first must beat month-first by more than this to win; otherwise
    /// month-first is the default interpretation.
    pub variant_margin: f64,
}

impl Default for DatetimePolicy {
    fn default() -> Self {
        Self {
            sample_size: 120,
            time_only_ratio: 0.95,
            time_only_date_ceiling: 0.2,
            unnamed_date_floor: 0.4,
            named_convert_ratio: 0.6,
            unnamed_convert_ratio: 0.95,
            variant_margin: 0.02,
        }
    }
}

/// Whether a column name carries a dateish token.
pub fn has_dateish_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    DATEISH_TOKENS.iter().any(|token| lower.contains(token))
}

/// Whether a trimmed value is a bare time with no date part.
pub fn is_time_only(value: &str) -> bool {
    TIME_ONLY_RE.is_match(value.trim())
}

/// Parse one value as a naive datetime under one day/month interpretation.
fn parse_datetime_value(value: &str, day_first: bool) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let ambiguous: &[&str] = if day_first {
        &DAY_FIRST_FORMATS
    } else {
        &MONTH_FIRST_FORMATS
    };

    for fmt in ambiguous.iter().chain(UNAMBIGUOUS_FORMATS.iter()) {
        let with_seconds = format!("{fmt} %H:%M:%S");
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, &with_seconds) {
            return Some(dt);
        }
        let with_minutes = format!("{fmt} %H:%M");
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, &with_minutes) {
            return Some(dt);
        }
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").ok()
}

/// Runs the per-column inference under a [`DatetimePolicy`].
#[derive(Debug, Default)]
pub struct TypeFinalizer {
    policy: DatetimePolicy,
}

impl TypeFinalizer {
    pub fn new(policy: DatetimePolicy) -> Self {
        Self { policy }
    }

    /// Resolve the dtype of every non-excluded string column, in column
    /// order. No column is ever dropped here.
    pub fn finalize(
        &self,
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
            if !matches!(series.dtype(), DataType::String) {
                continue;
            }

            if let Some(numeric) = try_numeric(&series) {
                let dtype = numeric.dtype().clone();
                df.replace(&name, numeric)?;
                metrics.columns_converted += 1;
                ctx.info(
                    StageKind::FinalizeDtypes,
                    format!("converted '{}' to {}", name, dtype),
                );
                continue;
            }

            if let Some(datetime) = self.try_datetime(&series)? {
                df.replace(&name, datetime)?;
                metrics.columns_converted += 1;
                ctx.info(
                    StageKind::FinalizeDtypes,
                    format!("converted '{}' to datetime", name),
                );
                continue;
            }

            ctx.info(StageKind::FinalizeDtypes, format!("'{}' stays text", name));
        }

        metrics.duration = start.elapsed();
        Ok((df, metrics))
    }

    /// Attempt a datetime conversion of a string column. Returns the
    /// converted series, or None when the heuristics reject the column.
    fn try_datetime(&self, series: &Series) -> Result<Option<Series>> {
        let ca = series.str()?;
        let policy = &self.policy;

        let sample: Vec<&str> = ca
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .take(policy.sample_size)
            .collect();
        if sample.is_empty() {
            return Ok(None);
        }

        let date_shaped = sample
            .iter()
            .filter(|v| DATE_SHAPED_RE.is_match(v) || MONTH_NAME_RE.is_match(v))
            .count() as f64
            / sample.len() as f64;
        let time_only = sample.iter().filter(|v| is_time_only(v)).count() as f64
            / sample.len() as f64;

        let name_hint = has_dateish_name(series.name().as_str());

        if time_only >= policy.time_only_ratio && date_shaped < policy.time_only_date_ceiling {
            // bare clock times belong to the temporal stage
            return Ok(None);
        }
        if !name_hint && date_shaped < policy.unnamed_date_floor {
            return Ok(None);
        }

        let (day_first_hits, non_empty) = score_variant(ca, true);
        let (month_first_hits, _) = score_variant(ca, false);
        if non_empty == 0 {
            return Ok(None);
        }

        let day_ratio = day_first_hits as f64 / non_empty as f64;
        let month_ratio = month_first_hits as f64 / non_empty as f64;
        let day_first = day_ratio > month_ratio + policy.variant_margin;
        let ratio = if day_first { day_ratio } else { month_ratio };

        let convert = (name_hint && ratio >= policy.named_convert_ratio)
            || ratio >= policy.unnamed_convert_ratio;
        if !convert {
            return Ok(None);
        }

        let millis: Vec<Option<i64>> = ca
            .into_iter()
            .map(|v| {
                v.and_then(|s| parse_datetime_value(s, day_first))
                    .map(|dt| dt.and_utc().timestamp_millis())
            })
            .collect();
        let converted = Series::new(series.name().clone(), millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
        Ok(Some(converted))
    }
}

/// Count values parseable under one day/month interpretation, plus the
/// non-empty total.
fn score_variant(ca: &StringChunked, day_first: bool) -> (usize, usize) {
    let mut hits = 0;
    let mut non_empty = 0;
    for value in ca.into_iter().flatten() {
        if value.trim().is_empty() {
            continue;
        }
        non_empty += 1;
        if parse_datetime_value(value, day_first).is_some() {
            hits += 1;
        }
    }
    (hits, non_empty)
}

/// Whole-column strict numeric parse. A single non-coercible value keeps
/// the entire column textual.
fn try_numeric(series: &Series) -> Option<Series> {
    let ca = series.str().ok()?;
    if ca.len() == ca.null_count() {
        return None;
    }

    let mut values: Vec<Option<f64>> = Vec::with_capacity(ca.len());
    for value in ca.into_iter() {
        match value {
            None => values.push(None),
            Some(s) => values.push(Some(utils::parse_numeric_strict(s)?)),
        }
    }

    let has_null = values.iter().any(Option::is_none);
    let parsed: Vec<f64> = values.iter().flatten().copied().collect();
    let fits_i64 = parsed.iter().all(|v| v.abs() < i64::MAX as f64);
    if !has_null && !utils::any_fractional(&parsed) && fits_i64 {
        let ints: Vec<i64> = parsed.iter().map(|v| *v as i64).collect();
        Some(Series::new(series.name().clone(), ints))
    } else {
        Some(Series::new(series.name().clone(), values))
    }
}
