//! Error types for the data-cleaning pipeline.
//!
//! A single `thiserror` hierarchy covers the whole run. The fatal/recoverable
//! boundary follows one rule: anything that could silently corrupt row-target
//! correspondence is fatal; anything that only degrades a single column's
//! transform quality is recoverable (logged, column left untouched).

use serde::ser::SerializeStruct;
use serde::Serialize;
use thiserror::Error;

/// The main error type for the cleaning pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input table was missing or had no rows/columns.
    #[error("Input table is empty")]
    EmptyInput,

    /// The configured target column does not exist in the table.
    #[error("Target column '{0}' not found in dataset")]
    TargetNotFound(String),

    /// A named column (manual removal, key column) does not exist.
    /// Stages treat this as recoverable: warn and skip the name.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Target encoding was requested but no target column is configured.
    #[error("Target encoding requires a target column")]
    MissingTarget,

    /// A per-column transform failed. Recoverable: the column is left
    /// unmodified and the run continues.
    #[error("Transform failed on column '{column}': {reason}")]
    Transform { column: String, reason: String },

    /// Row-identity bookkeeping broke (duplicate keys, missing identity
    /// column, non one-to-one target merge). Always fatal.
    #[error("Target alignment failed: {0}")]
    TargetMisaligned(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable code for callers that dispatch on error kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyInput => "EMPTY_INPUT",
            Self::TargetNotFound(_) => "TARGET_NOT_FOUND",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::MissingTarget => "MISSING_TARGET",
            Self::Transform { .. } => "TRANSFORM_FAILED",
            Self::TargetMisaligned(_) => "TARGET_MISALIGNED",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether a stage may swallow this error (warn + skip the column)
    /// instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ColumnNotFound(_) | Self::Transform { .. } => true,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

/// Serialized as `{code, message}` so a front end can dispatch on kind.
impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}
