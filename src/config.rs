//! Configuration types for the cleaning pipeline.
//!
//! A builder-pattern `PipelineConfig` controls which of the nine stages run
//! and with what parameters. The configuration is serde-round-trippable so a
//! front end can submit it as JSON.

use serde::{Deserialize, Serialize};

/// One named, independently toggleable stage of the fixed pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Manual removal of named columns
    ManualColumns,
    /// Removal of all-null columns
    DropEmptyColumns,
    /// Per-column null imputation / row dropping
    HandleNulls,
    /// Heuristic numeric/datetime/text type inference
    FinalizeDtypes,
    /// Statistical outlier drop/cap
    HandleOutliers,
    /// Categorical encoding
    Encoding,
    /// Variance + correlation feature selection
    FeatureSelection,
    /// Datetime/time-of-day decomposition
    TemporalFeatures,
    /// Numeric scaling
    Scaling,
}

impl StageKind {
    /// The fixed execution order. Enabling a stage never reorders it.
    pub const ALL: [StageKind; 9] = [
        StageKind::ManualColumns,
        StageKind::DropEmptyColumns,
        StageKind::HandleNulls,
        StageKind::FinalizeDtypes,
        StageKind::HandleOutliers,
        StageKind::Encoding,
        StageKind::FeatureSelection,
        StageKind::TemporalFeatures,
        StageKind::Scaling,
    ];

    /// Human-readable name for log lines and summaries.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ManualColumns => "Manual Column Removal",
            Self::DropEmptyColumns => "Empty Column Removal",
            Self::HandleNulls => "Null Handling",
            Self::FinalizeDtypes => "Dtype Finalization",
            Self::HandleOutliers => "Outlier Handling",
            Self::Encoding => "Categorical Encoding",
            Self::FeatureSelection => "Feature Selection",
            Self::TemporalFeatures => "Temporal Feature Extraction",
            Self::Scaling => "Feature Scaling",
        }
    }
}

/// Statistical method used to bound outliers in a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    /// Bounds at Q1 - k*IQR and Q3 + k*IQR (k default 1.5)
    #[default]
    Iqr,
    /// Bounds at mean +/- t * population stddev (t default 3.0)
    Zscore,
    /// MAD-based modified Z-score, |0.6745*(x-median)/MAD| > 3.5
    ModifiedZscore,
}

/// How categorical columns are turned into model-ready numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EncodingMethod {
    /// Sorted-distinct values mapped to integer codes
    Label,
    /// One 0/1 indicator column per distinct value
    #[default]
    Onehot,
    /// Each category replaced by the mean target value
    Target,
}

/// How numeric feature columns are rescaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMethod {
    /// (x - mean) / population stddev
    #[default]
    Standard,
    /// (x - min) / (max - min)
    Minmax,
}

/// Configuration for one pipeline run.
///
/// Use [`PipelineConfig::builder()`] for fluent construction with validation.
///
/// # Example
///
/// ```rust,ignore
/// use prismaflow::{PipelineConfig, OutlierMethod};
///
/// let config = PipelineConfig::builder()
///     .target_column("price")
///     .null_threshold(0.1)
///     .outlier_method(OutlierMethod::Zscore)
///     .outlier_drop(false)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Stages to run, out of the fixed nine-stage vocabulary. Execution
    /// order is always [`StageKind::ALL`]; this only selects the subset.
    /// Default: all nine.
    pub enabled_stages: Vec<StageKind>,

    /// The label column to detach before feature stages and reattach after.
    /// Default: None
    pub target_column: Option<String>,

    /// Columns to force-drop in the manual removal stage.
    pub manual_columns: Vec<String>,

    /// Columns exempt from every drop/alter stage.
    pub columns_to_keep: Vec<String>,

    /// Extra columns the outlier stage must leave alone.
    pub outlier_skipping: Vec<String>,

    /// Extra columns the scaling stage must leave alone.
    pub scaling_skipping: Vec<String>,

    /// Missingness ratio at or above which a column is imputed instead of
    /// having its null rows dropped. Default: 0.05
    pub null_threshold: f64,

    /// Outlier bound computation method. Default: IQR
    pub outlier_method: OutlierMethod,

    /// Method parameter override: IQR multiplier k, Z-score t, or modified
    /// Z-score threshold. Default: None (method default applies)
    pub outlier_param: Option<f64>,

    /// Drop flagged rows (true) or cap flagged values at the bound (false).
    /// Default: true
    pub outlier_drop: bool,

    /// Categorical encoding method. Default: one-hot
    pub encoding_method: EncodingMethod,

    /// Numeric columns with population variance at or below this are dropped
    /// by feature selection. Default: 0.01
    pub variance_threshold: f64,

    /// Absolute pairwise correlation above which the later column of a pair
    /// is dropped. Default: 0.9
    pub correlation_threshold: f64,

    /// Numeric scaling method. Default: standard
    pub scaling_method: ScalingMethod,

    /// Aggregate per-run metrics and return them to the caller.
    /// Default: true
    pub collect_metrics: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled_stages: StageKind::ALL.to_vec(),
            target_column: None,
            manual_columns: Vec::new(),
            columns_to_keep: Vec::new(),
            outlier_skipping: Vec::new(),
            scaling_skipping: Vec::new(),
            null_threshold: 0.05,
            outlier_method: OutlierMethod::default(),
            outlier_param: None,
            outlier_drop: true,
            encoding_method: EncodingMethod::default(),
            variance_threshold: 0.01,
            correlation_threshold: 0.9,
            scaling_method: ScalingMethod::default(),
            collect_metrics: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Whether a stage is in the enabled set.
    pub fn stage_enabled(&self, stage: StageKind) -> bool {
        self.enabled_stages.contains(&stage)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(0.0..=1.0).contains(&self.null_threshold) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "null_threshold".to_string(),
                value: self.null_threshold,
            });
        }
        if !(0.0..=1.0).contains(&self.correlation_threshold) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "correlation_threshold".to_string(),
                value: self.correlation_threshold,
            });
        }
        if self.variance_threshold < 0.0 {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "variance_threshold".to_string(),
                value: self.variance_threshold,
            });
        }
        if let Some(param) = self.outlier_param {
            if !param.is_finite() || param <= 0.0 {
                return Err(ConfigValidationError::InvalidOutlierParam(param));
            }
        }
        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid outlier parameter: {0} (must be a positive finite number)")]
    InvalidOutlierParam(f64),
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    enabled_stages: Option<Vec<StageKind>>,
    target_column: Option<String>,
    manual_columns: Option<Vec<String>>,
    columns_to_keep: Option<Vec<String>>,
    outlier_skipping: Option<Vec<String>>,
    scaling_skipping: Option<Vec<String>>,
    null_threshold: Option<f64>,
    outlier_method: Option<OutlierMethod>,
    outlier_param: Option<f64>,
    outlier_drop: Option<bool>,
    encoding_method: Option<EncodingMethod>,
    variance_threshold: Option<f64>,
    correlation_threshold: Option<f64>,
    scaling_method: Option<ScalingMethod>,
    collect_metrics: Option<bool>,
}

impl PipelineConfigBuilder {
    /// Replace the enabled stage set (execution order stays fixed).
    pub fn enabled_stages(mut self, stages: impl Into<Vec<StageKind>>) -> Self {
        self.enabled_stages = Some(stages.into());
        self
    }

    /// Remove a single stage from the enabled set.
    pub fn disable_stage(mut self, stage: StageKind) -> Self {
        let mut stages = self
            .enabled_stages
            .take()
            .unwrap_or_else(|| StageKind::ALL.to_vec());
        stages.retain(|s| *s != stage);
        self.enabled_stages = Some(stages);
        self
    }

    /// Set the target column to detach/reattach around feature stages.
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = Some(column.into());
        self
    }

    /// Columns to force-drop in the manual removal stage.
    pub fn manual_columns(mut self, columns: Vec<String>) -> Self {
        self.manual_columns = Some(columns);
        self
    }

    /// Columns exempt from every drop/alter stage.
    pub fn columns_to_keep(mut self, columns: Vec<String>) -> Self {
        self.columns_to_keep = Some(columns);
        self
    }

    /// Extra columns exempt from the outlier stage only.
    pub fn outlier_skipping(mut self, columns: Vec<String>) -> Self {
        self.outlier_skipping = Some(columns);
        self
    }

    /// Extra columns exempt from the scaling stage only.
    pub fn scaling_skipping(mut self, columns: Vec<String>) -> Self {
        self.scaling_skipping = Some(columns);
        self
    }

    /// Missingness ratio separating imputation from row-dropping.
    pub fn null_threshold(mut self, threshold: f64) -> Self {
        self.null_threshold = Some(threshold);
        self
    }

    /// Outlier bound computation method.
    pub fn outlier_method(mut self, method: OutlierMethod) -> Self {
        self.outlier_method = Some(method);
        self
    }

    /// Method parameter override (IQR k / Z-score t / modified Z threshold).
    pub fn outlier_param(mut self, param: f64) -> Self {
        self.outlier_param = Some(param);
        self
    }

    /// Drop flagged rows (true) or cap flagged values (false).
    pub fn outlier_drop(mut self, drop: bool) -> Self {
        self.outlier_drop = Some(drop);
        self
    }

    /// Categorical encoding method.
    pub fn encoding_method(mut self, method: EncodingMethod) -> Self {
        self.encoding_method = Some(method);
        self
    }

    /// Variance floor for feature selection.
    pub fn variance_threshold(mut self, threshold: f64) -> Self {
        self.variance_threshold = Some(threshold);
        self
    }

    /// Absolute correlation ceiling for feature selection.
    pub fn correlation_threshold(mut self, threshold: f64) -> Self {
        self.correlation_threshold = Some(threshold);
        self
    }

    /// Numeric scaling method.
    pub fn scaling_method(mut self, method: ScalingMethod) -> Self {
        self.scaling_method = Some(method);
        self
    }

    /// Enable or disable per-run metrics aggregation.
    pub fn collect_metrics(mut self, collect: bool) -> Self {
        self.collect_metrics = Some(collect);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            enabled_stages: self.enabled_stages.unwrap_or(defaults.enabled_stages),
            target_column: self.target_column,
            manual_columns: self.manual_columns.unwrap_or_default(),
            columns_to_keep: self.columns_to_keep.unwrap_or_default(),
            outlier_skipping: self.outlier_skipping.unwrap_or_default(),
            scaling_skipping: self.scaling_skipping.unwrap_or_default(),
            null_threshold: self.null_threshold.unwrap_or(defaults.null_threshold),
            outlier_method: self.outlier_method.unwrap_or_default(),
            outlier_param: self.outlier_param,
            outlier_drop: self.outlier_drop.unwrap_or(true),
            encoding_method: self.encoding_method.unwrap_or_default(),
            variance_threshold: self
                .variance_threshold
                .unwrap_or(defaults.variance_threshold),
            correlation_threshold: self
                .correlation_threshold
                .unwrap_or(defaults.correlation_threshold),
            scaling_method: self.scaling_method.unwrap_or_default(),
            collect_metrics: self.collect_metrics.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.enabled_stages.len(), 9);
        assert_eq!(config.null_threshold, 0.05);
        assert_eq!(config.outlier_method, OutlierMethod::Iqr);
        assert!(config.outlier_drop);
        assert_eq!(config.encoding_method, EncodingMethod::Onehot);
        assert_eq!(config.scaling_method, ScalingMethod::Standard);
        assert!(config.collect_metrics);
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PipelineConfig::builder()
            .target_column("price")
            .null_threshold(0.2)
            .outlier_method(OutlierMethod::ModifiedZscore)
            .outlier_param(4.0)
            .outlier_drop(false)
            .disable_stage(StageKind::Scaling)
            .build()
            .unwrap();

        assert_eq!(config.target_column.as_deref(), Some("price"));
        assert_eq!(config.null_threshold, 0.2);
        assert_eq!(config.outlier_method, OutlierMethod::ModifiedZscore);
        assert_eq!(config.outlier_param, Some(4.0));
        assert!(!config.outlier_drop);
        assert!(!config.stage_enabled(StageKind::Scaling));
        assert!(config.stage_enabled(StageKind::HandleNulls));
    }

    #[test]
    fn test_validation_invalid_null_threshold() {
        let result = PipelineConfig::builder().null_threshold(1.5).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));
    }

    #[test]
    fn test_validation_invalid_outlier_param() {
        let result = PipelineConfig::builder().outlier_param(-1.0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidOutlierParam(_)
        ));
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = PipelineConfig::builder()
            .target_column("label")
            .outlier_method(OutlierMethod::Zscore)
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.target_column.as_deref(), Some("label"));
        assert_eq!(back.outlier_method, OutlierMethod::Zscore);
    }

    #[test]
    fn test_config_from_frontend_json() {
        let json = r#"{
            "enabled_stages": ["handle_nulls", "handle_outliers", "scaling"],
            "target_column": "label",
            "manual_columns": ["notes"],
            "columns_to_keep": ["id"],
            "outlier_skipping": [],
            "scaling_skipping": [],
            "null_threshold": 0.1,
            "outlier_method": "modified_zscore",
            "outlier_param": 3.0,
            "outlier_drop": false,
            "encoding_method": "label",
            "variance_threshold": 0.01,
            "correlation_threshold": 0.95,
            "scaling_method": "minmax",
            "collect_metrics": false
        }"#;

        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.enabled_stages.len(), 3);
        assert!(config.stage_enabled(StageKind::HandleOutliers));
        assert!(!config.stage_enabled(StageKind::Encoding));
        assert_eq!(config.outlier_method, OutlierMethod::ModifiedZscore);
        assert_eq!(config.encoding_method, EncodingMethod::Label);
        assert_eq!(config.scaling_method, ScalingMethod::Minmax);
        assert!(!config.collect_metrics);
    }
}
