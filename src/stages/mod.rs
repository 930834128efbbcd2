//! The nine cleaning stages, one module each.
//!
//! Stages are pure frame transforms: each consumes a `DataFrame`, returns
//! the transformed frame plus [`StageMetrics`], and reports what it did
//! through the shared [`StageContext`]. Stages may drop rows and columns
//! but never reorder or renumber row identities.

pub mod columns;
pub mod dtypes;
pub mod encoding;
pub mod feature_selection;
pub mod nulls;
pub mod outliers;
pub mod scaling;
pub mod temporal;

use crate::config::StageKind;
use crate::events::{EventSink, PipelineEvent};
use crate::pipeline::target::ROW_ID_COLUMN;

/// Shared per-run state handed to every stage.
pub struct StageContext<'a> {
    events: &'a dyn EventSink,
    protected: &'a [String],
}

impl<'a> StageContext<'a> {
    pub fn new(events: &'a dyn EventSink, protected: &'a [String]) -> Self {
        Self { events, protected }
    }

    /// Columns no stage may drop or alter: the caller's keep-list plus the
    /// internal row identity column.
    pub fn is_protected(&self, column: &str) -> bool {
        column == ROW_ID_COLUMN || self.protected.iter().any(|c| c == column)
    }

    pub fn info(&self, stage: StageKind, message: impl Into<String>) {
        self.events.emit(PipelineEvent::info(stage, message));
    }

    pub fn warn(&self, stage: StageKind, message: impl Into<String>) {
        self.events.emit(PipelineEvent::warn(stage, message));
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::events::MemorySink;

    /// Context backed by a memory sink with no protected columns.
    pub fn silent_ctx(sink: &MemorySink) -> StageContext<'_> {
        StageContext::new(sink, &[])
    }
}
