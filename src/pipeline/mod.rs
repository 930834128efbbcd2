//! Pipeline orchestration: row identity, target handling, and the runner.

pub mod runner;
pub mod target;

pub use runner::{Pipeline, PipelineBuilder, PipelineOutput};
pub use target::{KeyedTarget, ROW_ID_COLUMN};
