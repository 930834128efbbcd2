//! PrismaFlow Data Cleaning Pipeline
//!
//! A tabular data-cleaning library built on Polars. It runs a fixed sequence
//! of independently toggleable stages over one in-memory table and returns
//! the cleaned result plus per-run metrics.
//!
//! # Overview
//!
//! The nine stages, always executed in this order when enabled:
//!
//! - **Manual column removal**: drop caller-named columns
//! - **Empty column removal**: drop all-null columns
//! - **Null handling**: impute heavily-missing columns, drop sparse null rows
//! - **Dtype finalization**: heuristic numeric and datetime inference
//! - **Outlier handling**: IQR / Z-score / modified Z-score, drop or cap
//! - **Categorical encoding**: label, one-hot, or target encoding
//! - **Feature selection**: variance floor plus pairwise correlation pruning
//! - **Temporal features**: datetime decomposition into calendar sub-columns
//! - **Scaling**: standard or min-max
//!
//! A configured target column is detached before the stages run, keyed by a
//! synthetic row identity, and reattached afterward so that rows dropped
//! mid-run never shift a surviving row's label.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use prismaflow::{io, Pipeline, PipelineConfig, OutlierMethod};
//!
//! let df = io::load_csv("data.csv")?;
//!
//! let config = PipelineConfig::builder()
//!     .target_column("price")
//!     .null_threshold(0.05)
//!     .outlier_method(OutlierMethod::Iqr)
//!     .build()?;
//!
//! let output = Pipeline::builder()
//!     .config(config)
//!     .on_event(|event| println!("{:?}: {}", event.stage, event.message))
//!     .build()?
//!     .run(df)?;
//!
//! println!("cleaned: {:?}", output.table.shape());
//! if let Some(metrics) = output.metrics {
//!     println!("{}", metrics.summary());
//! }
//! ```
//!
//! # Error Handling
//!
//! Fatal conditions (empty input, a missing target, anything that could
//! corrupt the row/target correspondence) abort the run with a
//! [`PipelineError`]. Per-column transform trouble is recoverable: the
//! column is left unchanged and a warning lands in the event log.

pub mod config;
pub mod error;
pub mod events;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod stages;
pub mod utils;

pub use config::{
    ConfigValidationError, EncodingMethod, OutlierMethod, PipelineConfig, PipelineConfigBuilder,
    ScalingMethod, StageKind,
};
pub use error::{PipelineError, Result, ResultExt};
pub use events::{ClosureEventSink, EventLevel, EventSink, MemorySink, PipelineEvent, TracingSink};
pub use metrics::{RunMetrics, StageMetrics};
pub use pipeline::{KeyedTarget, Pipeline, PipelineBuilder, PipelineOutput};
pub use stages::dtypes::{DatetimePolicy, TypeFinalizer};
pub use stages::outliers::OutlierHandler;
