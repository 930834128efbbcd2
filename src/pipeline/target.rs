//! Row identity and target detach/reattach.
//!
//! The pipeline keys every row with a synthetic identity column before any
//! stage runs. Stages may drop rows, but they never reorder identities or
//! invent new ones, so the detached target column can always be realigned
//! with whatever rows survive.

use polars::prelude::*;
use std::collections::HashMap;

use crate::error::{PipelineError, Result};

/// Name of the synthetic row identity column. Internal to a run; it is
/// stripped before the frame is returned to the caller.
pub const ROW_ID_COLUMN: &str = "__prismaflow_row_id__";

/// Prepend a UInt32 identity column numbering rows 1..=N.
pub fn assign_row_ids(df: &DataFrame) -> Result<DataFrame> {
    if df
        .get_column_names()
        .iter()
        .any(|n| n.as_str() == ROW_ID_COLUMN)
    {
        return Err(PipelineError::TargetMisaligned(format!(
            "input already contains reserved column '{}'",
            ROW_ID_COLUMN
        )));
    }

    let ids: Vec<u32> = (1..=df.height() as u32).collect();
    let id_series = Series::new(ROW_ID_COLUMN.into(), ids);

    let mut columns = vec![id_series.into_column()];
    columns.extend(df.get_columns().iter().cloned());
    Ok(DataFrame::new(columns)?)
}

/// Read the identity column of a frame, rejecting duplicates.
fn row_ids_of(df: &DataFrame) -> Result<Vec<u32>> {
    let column = df.column(ROW_ID_COLUMN).map_err(|_| {
        PipelineError::TargetMisaligned(format!("identity column '{}' is missing", ROW_ID_COLUMN))
    })?;
    let ca = column
        .as_materialized_series()
        .u32()
        .map_err(|_| {
            PipelineError::TargetMisaligned(format!(
                "identity column '{}' is not UInt32",
                ROW_ID_COLUMN
            ))
        })?;

    let mut ids = Vec::with_capacity(ca.len());
    let mut seen = std::collections::HashSet::with_capacity(ca.len());
    for id in ca.into_iter() {
        let id = id.ok_or_else(|| {
            PipelineError::TargetMisaligned("identity column contains nulls".to_string())
        })?;
        if !seen.insert(id) {
            return Err(PipelineError::TargetMisaligned(format!(
                "duplicate row identity {}",
                id
            )));
        }
        ids.push(id);
    }
    Ok(ids)
}

/// A target column detached from the frame, keyed by row identity.
#[derive(Debug, Clone)]
pub struct KeyedTarget {
    name: String,
    values: Series,
    index: HashMap<u32, usize>,
}

impl KeyedTarget {
    /// Target column name as it will reappear in the output.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The detached values in their original row order.
    pub fn values(&self) -> &Series {
        &self.values
    }

    /// The target value for one row identity, as an f64 when numeric.
    pub fn numeric_value(&self, row_id: u32) -> Option<f64> {
        let idx = *self.index.get(&row_id)?;
        self.values
            .get(idx)
            .ok()
            .and_then(|v| v.try_extract::<f64>().ok())
    }

    /// Produce a target Series aligned to the surviving rows of `df`,
    /// in frame order. Row identities with no target entry yield nulls.
    pub fn aligned_to(&self, df: &DataFrame) -> Result<Series> {
        let ids = row_ids_of(df)?;
        let indices: IdxCa = ids
            .iter()
            .map(|id| self.index.get(id).map(|&i| i as IdxSize))
            .collect();
        let mut aligned = self.values.take(&indices)?;
        aligned.rename(self.name.as_str().into());
        Ok(aligned)
    }
}

/// Remove the target column from the frame, keyed by the identity column.
pub fn detach_target(df: &mut DataFrame, target: &str) -> Result<KeyedTarget> {
    let ids = row_ids_of(df)?;
    let values = df
        .drop_in_place(target)
        .map_err(|_| PipelineError::TargetNotFound(target.to_string()))?;
    let values = values.take_materialized_series();

    let mut index = HashMap::with_capacity(ids.len());
    for (pos, id) in ids.into_iter().enumerate() {
        index.insert(id, pos);
    }

    Ok(KeyedTarget {
        name: target.to_string(),
        values,
        index,
    })
}

/// Append the realigned target column to the frame.
pub fn reattach_target(df: &mut DataFrame, target: &KeyedTarget) -> Result<()> {
    let aligned = target.aligned_to(df)?;
    df.with_column(aligned)?;
    Ok(())
}

/// Strip the identity column before handing the frame back to the caller.
pub fn drop_row_ids(df: &mut DataFrame) -> Result<()> {
    let _ = df.drop_in_place(ROW_ID_COLUMN).map_err(|_| {
        PipelineError::TargetMisaligned(format!("identity column '{}' is missing", ROW_ID_COLUMN))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df! {
            "feature" => &[10.0, 20.0, 30.0, 40.0],
            "label" => &["a", "b", "a", "b"],
        }
        .unwrap()
    }

    #[test]
    fn test_assign_row_ids_numbers_from_one() {
        let df = assign_row_ids(&frame()).unwrap();
        assert_eq!(df.get_column_names()[0].as_str(), ROW_ID_COLUMN);
        let ids = row_ids_of(&df).unwrap();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_assign_rejects_reserved_name() {
        let bad = df! { ROW_ID_COLUMN => &[1u32, 2] }.unwrap();
        let err = assign_row_ids(&bad).unwrap_err();
        assert_eq!(err.error_code(), "TARGET_MISALIGNED");
    }

    #[test]
    fn test_detach_and_reattach_after_row_drop() {
        let mut df = assign_row_ids(&frame()).unwrap();
        let target = detach_target(&mut df, "label").unwrap();
        assert!(df.column("label").is_err());

        // drop the middle two rows, keeping identities 1 and 4
        let mask = BooleanChunked::from_slice("mask".into(), &[true, false, false, true]);
        let df_filtered = df.filter(&mask).unwrap();

        let mut out = df_filtered;
        reattach_target(&mut out, &target).unwrap();

        let label = out.column("label").unwrap().as_materialized_series().clone();
        let label = label.str().unwrap();
        let values: Vec<Option<&str>> = label.into_iter().collect();
        assert_eq!(values, vec![Some("a"), Some("b")]);
        assert_eq!(out.column("label").unwrap().null_count(), 0);
    }

    #[test]
    fn test_detach_unknown_target() {
        let mut df = assign_row_ids(&frame()).unwrap();
        let err = detach_target(&mut df, "nope").unwrap_err();
        assert_eq!(err.error_code(), "TARGET_NOT_FOUND");
    }

    #[test]
    fn test_duplicate_row_ids_are_fatal() {
        let mut df = df! {
            ROW_ID_COLUMN => &[1u32, 1, 2],
            "feature" => &[1.0, 2.0, 3.0],
            "label" => &[0.0, 1.0, 0.0],
        }
        .unwrap();
        let err = detach_target(&mut df, "label").unwrap_err();
        assert_eq!(err.error_code(), "TARGET_MISALIGNED");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_drop_row_ids_strips_identity_column() {
        let mut df = assign_row_ids(&frame()).unwrap();
        drop_row_ids(&mut df).unwrap();
        assert!(df.column(ROW_ID_COLUMN).is_err());
        assert_eq!(df.width(), 2);
    }

    #[test]
    fn test_numeric_value_lookup() {
        let mut df = assign_row_ids(
            &df! {
                "x" => &[1.0, 2.0],
                "y" => &[10.5, 20.5],
            }
            .unwrap(),
        )
        .unwrap();
        let target = detach_target(&mut df, "y").unwrap();
        assert_eq!(target.numeric_value(1), Some(10.5));
        assert_eq!(target.numeric_value(2), Some(20.5));
        assert_eq!(target.numeric_value(99), None);
    }
}
