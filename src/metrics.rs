//! Per-run metrics collected during pipeline execution.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::StageKind;

/// What one stage did to the frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageMetrics {
    /// Rows removed by this stage.
    pub rows_dropped: usize,
    /// Columns removed by this stage.
    pub columns_dropped: usize,
    /// Columns added by this stage (one-hot indicators, temporal features).
    pub columns_added: usize,
    /// Individual cell values filled in by this stage.
    pub cells_imputed: usize,
    /// Individual cell values capped at an outlier bound.
    pub cells_capped: usize,
    /// Columns whose dtype was changed by this stage.
    pub columns_converted: usize,
    /// Wall-clock time spent in this stage.
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

/// Aggregate metrics for one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Row count of the input frame.
    pub rows_in: usize,
    /// Row count of the output frame.
    pub rows_out: usize,
    /// Column count of the input frame.
    pub columns_in: usize,
    /// Column count of the output frame.
    pub columns_out: usize,
    /// Per-stage breakdown, in execution order, enabled stages only.
    pub stages: Vec<(StageKind, StageMetrics)>,
    /// Total wall-clock time for the run.
    #[serde(with = "duration_millis")]
    pub total_duration: Duration,
}

impl RunMetrics {
    /// Record a completed stage.
    pub fn record_stage(&mut self, stage: StageKind, metrics: StageMetrics) {
        self.stages.push((stage, metrics));
    }

    /// Metrics for a stage, if it ran.
    pub fn stage(&self, stage: StageKind) -> Option<&StageMetrics> {
        self.stages.iter().find(|(s, _)| *s == stage).map(|(_, m)| m)
    }

    /// Total rows removed across all stages.
    pub fn total_rows_dropped(&self) -> usize {
        self.stages.iter().map(|(_, m)| m.rows_dropped).sum()
    }

    /// Total columns removed across all stages.
    pub fn total_columns_dropped(&self) -> usize {
        self.stages.iter().map(|(_, m)| m.columns_dropped).sum()
    }

    /// Total cell values imputed across all stages.
    pub fn total_cells_imputed(&self) -> usize {
        self.stages.iter().map(|(_, m)| m.cells_imputed).sum()
    }

    /// One-line run summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} -> {} rows, {} -> {} columns in {:.2}s",
            self.rows_in,
            self.rows_out,
            self.columns_in,
            self.columns_out,
            self.total_duration.as_secs_f64()
        )
    }
}

/// Serialize `Duration` as integer milliseconds so the JSON stays flat.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(de)?;
        Ok(Duration::from_millis(millis))
    }
}
