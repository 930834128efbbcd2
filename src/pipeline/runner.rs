//! The pipeline runner: sequences the enabled stages in fixed order.
//!
//! # Example
//!
//! ```rust,ignore
//! use prismaflow::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::builder()
//!     .target_column("price")
//!     .build()?;
//!
//! let output = Pipeline::builder()
//!     .config(config)
//!     .on_event(|event| println!("{:?}: {}", event.stage, event.message))
//!     .build()?
//!     .run(df)?;
//! ```

use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::{EncodingMethod, PipelineConfig, StageKind};
use crate::error::{PipelineError, Result};
use crate::events::{ClosureEventSink, EventSink, PipelineEvent, TracingSink};
use crate::metrics::RunMetrics;
use crate::pipeline::target::{
    assign_row_ids, detach_target, drop_row_ids, reattach_target, KeyedTarget,
};
use crate::stages::dtypes::{DatetimePolicy, TypeFinalizer};
use crate::stages::outliers::OutlierHandler;
use crate::stages::{columns, encoding, feature_selection, nulls, scaling, temporal, StageContext};

/// The cleaned table, plus metrics when collection is enabled.
#[derive(Debug)]
pub struct PipelineOutput {
    pub table: DataFrame,
    pub metrics: Option<RunMetrics>,
}

/// A configured, reusable cleaning pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    events: Arc<dyn EventSink>,
    datetime_policy: DatetimePolicy,
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("datetime_policy", &self.datetime_policy)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Run the pipeline over one table.
    ///
    /// Assigns the row identity column, detaches the target if configured,
    /// runs every enabled stage in the fixed order, reattaches the target
    /// keyed by identity, strips the identity column, and returns the
    /// result. Fatal errors abort the run; per-column trouble inside a
    /// stage only lands in the event log.
    pub fn run(&self, df: DataFrame) -> Result<PipelineOutput> {
        let run_start = Instant::now();

        if df.height() == 0 || df.width() == 0 {
            return Err(PipelineError::EmptyInput);
        }

        let mut metrics = RunMetrics {
            rows_in: df.height(),
            columns_in: df.width(),
            ..Default::default()
        };

        self.events.emit(PipelineEvent::run_level(
            crate::events::EventLevel::Info,
            format!("starting run on {} rows x {} columns", df.height(), df.width()),
        ));

        let mut df = assign_row_ids(&df)?;

        let target: Option<KeyedTarget> = match &self.config.target_column {
            Some(name) => {
                let target = detach_target(&mut df, name)?;
                self.events.emit(PipelineEvent::run_level(
                    crate::events::EventLevel::Info,
                    format!(
                        "detached target '{}' ({} values)",
                        target.name(),
                        target.values().len()
                    ),
                ));
                Some(target)
            }
            None => {
                if self.config.encoding_method == EncodingMethod::Target
                    && self.config.stage_enabled(StageKind::Encoding)
                {
                    return Err(PipelineError::MissingTarget);
                }
                None
            }
        };

        let ctx = StageContext::new(self.events.as_ref(), &self.config.columns_to_keep);

        for stage in StageKind::ALL {
            if !self.config.stage_enabled(stage) {
                continue;
            }
            self.events
                .emit(PipelineEvent::info(stage, "stage started"));

            let (next, stage_metrics) = self.run_stage(stage, df, target.as_ref(), &ctx)?;
            df = next;

            self.events.emit(PipelineEvent::info(
                stage,
                format!(
                    "stage finished ({} rows, {} columns)",
                    df.height(),
                    df.width().saturating_sub(1)
                ),
            ));
            if self.config.collect_metrics {
                metrics.record_stage(stage, stage_metrics);
            }
        }

        if let Some(target) = &target {
            reattach_target(&mut df, target)?;
        }
        drop_row_ids(&mut df)?;

        metrics.rows_out = df.height();
        metrics.columns_out = df.width();
        metrics.total_duration = run_start.elapsed();

        info!("run complete: {}", metrics.summary());
        self.events.emit(PipelineEvent::run_level(
            crate::events::EventLevel::Info,
            format!("run complete: {}", metrics.summary()),
        ));

        Ok(PipelineOutput {
            table: df,
            metrics: self.config.collect_metrics.then_some(metrics),
        })
    }

    fn run_stage(
        &self,
        stage: StageKind,
        df: DataFrame,
        target: Option<&KeyedTarget>,
        ctx: &StageContext<'_>,
    ) -> Result<(DataFrame, crate::metrics::StageMetrics)> {
        let config = &self.config;
        match stage {
            StageKind::ManualColumns => {
                columns::remove_manual_columns(df, &config.manual_columns, ctx)
            }
            StageKind::DropEmptyColumns => columns::drop_empty_columns(df, ctx),
            StageKind::HandleNulls => nulls::handle_nulls(df, config.null_threshold, ctx),
            StageKind::FinalizeDtypes => {
                TypeFinalizer::new(self.datetime_policy.clone()).finalize(df, ctx)
            }
            StageKind::HandleOutliers => OutlierHandler::new(
                config.outlier_method,
                config.outlier_param,
                config.outlier_drop,
            )
            .handle(df, &config.outlier_skipping, ctx),
            StageKind::Encoding => encoding::encode(df, config.encoding_method, target, ctx),
            StageKind::FeatureSelection => feature_selection::select_features(
                df,
                config.variance_threshold,
                config.correlation_threshold,
                ctx,
            ),
            StageKind::TemporalFeatures => temporal::extract_temporal(df, ctx),
            StageKind::Scaling => {
                scaling::scale(df, config.scaling_method, &config.scaling_skipping, ctx)
            }
        }
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    events: Option<Arc<dyn EventSink>>,
    datetime_policy: Option<DatetimePolicy>,
}

impl PipelineBuilder {
    /// Set the run configuration. Defaults to [`PipelineConfig::default`].
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Install an event sink. Defaults to forwarding to `tracing`.
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Install a closure as the event sink.
    pub fn on_event<F>(self, callback: F) -> Self
    where
        F: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        self.event_sink(Arc::new(ClosureEventSink::new(callback)))
    }

    /// Override the datetime inference thresholds.
    pub fn datetime_policy(mut self, policy: DatetimePolicy) -> Self {
        self.datetime_policy = Some(policy);
        self
    }

    /// Validate the configuration and build the pipeline.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;

        Ok(Pipeline {
            config,
            events: self.events.unwrap_or_else(|| Arc::new(TracingSink)),
            datetime_policy: self.datetime_policy.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutlierMethod;
    use crate::events::MemorySink;

    fn quiet_pipeline(config: PipelineConfig) -> Pipeline {
        Pipeline::builder()
            .config(config)
            .on_event(|_| {})
            .build()
            .unwrap()
    }

    #[test]
    fn test_empty_input_rejected() {
        let pipeline = quiet_pipeline(PipelineConfig::default());
        let df = df! { "x" => Vec::<f64>::new() }.unwrap();
        let err = pipeline.run(df).unwrap_err();
        assert_eq!(err.error_code(), "EMPTY_INPUT");
    }

    #[test]
    fn test_missing_target_rejected_up_front() {
        let config = PipelineConfig::builder()
            .target_column("nope")
            .build()
            .unwrap();
        let pipeline = quiet_pipeline(config);
        let df = df! { "x" => &[1.0, 2.0] }.unwrap();
        let err = pipeline.run(df).unwrap_err();
        assert_eq!(err.error_code(), "TARGET_NOT_FOUND");
    }

    #[test]
    fn test_target_encoding_without_target_name_rejected() {
        let config = PipelineConfig::builder()
            .encoding_method(EncodingMethod::Target)
            .build()
            .unwrap();
        let pipeline = quiet_pipeline(config);
        let df = df! { "tag" => &["a", "b"] }.unwrap();
        let err = pipeline.run(df).unwrap_err();
        assert_eq!(err.error_code(), "MISSING_TARGET");
    }

    #[test]
    fn test_invalid_config_rejected_at_build() {
        let config = PipelineConfig {
            null_threshold: 2.0,
            ..Default::default()
        };
        let err = Pipeline::builder().config(config).build().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_null_then_outlier_ordering() {
        // nulls are imputed strictly before outlier bounds are computed,
        // so the extreme value survives imputation and is then dropped
        let config = PipelineConfig::builder()
            .enabled_stages(vec![StageKind::HandleNulls, StageKind::HandleOutliers])
            .null_threshold(0.05)
            .outlier_method(OutlierMethod::Iqr)
            .build()
            .unwrap();
        let pipeline = quiet_pipeline(config);

        let df = df! {
            "age" => &[
                Some(20.0), Some(21.0), Some(22.0), Some(23.0), Some(24.0),
                Some(25.0), Some(26.0), Some(27.0), None, Some(5000.0),
            ],
        }
        .unwrap();

        let output = pipeline.run(df).unwrap();
        let metrics = output.metrics.unwrap();
        assert_eq!(metrics.stage(StageKind::HandleNulls).unwrap().cells_imputed, 1);
        // the null row was imputed with the mean (about 576.4), which the
        // IQR pass then flags along with 5000
        assert_eq!(metrics.stage(StageKind::HandleOutliers).unwrap().rows_dropped, 2);
        assert_eq!(output.table.height(), 8);

        let ages: Vec<f64> = output
            .table
            .column("age")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(ages, vec![20.0, 21.0, 22.0, 23.0, 24.0, 25.0, 26.0, 27.0]);
    }

    #[test]
    fn test_target_survives_row_drops_with_original_values() {
        // rows dropped mid-run must not shift target values on survivors
        let config = PipelineConfig::builder()
            .enabled_stages(vec![StageKind::HandleOutliers])
            .target_column("price")
            .build()
            .unwrap();
        let pipeline = quiet_pipeline(config);

        let df = df! {
            "size" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 1000.0],
            "price" => &[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0],
        }
        .unwrap();

        let output = pipeline.run(df).unwrap();
        assert_eq!(output.table.height(), 9);

        let price = output.table.column("price").unwrap();
        assert_eq!(price.null_count(), 0);
        let prices: Vec<f64> = price
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(
            prices,
            vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0]
        );
    }

    #[test]
    fn test_disabled_stage_does_not_run() {
        let config = PipelineConfig::builder()
            .enabled_stages(vec![StageKind::Scaling])
            .manual_columns(vec!["x".to_string()])
            .build()
            .unwrap();
        let pipeline = quiet_pipeline(config);

        let df = df! { "x" => &[1.0, 2.0] }.unwrap();
        let output = pipeline.run(df).unwrap();
        // manual removal disabled, so x survives (scaled)
        assert!(output.table.column("x").is_ok());

        let metrics = output.metrics.unwrap();
        assert!(metrics.stage(StageKind::ManualColumns).is_none());
        assert!(metrics.stage(StageKind::Scaling).is_some());
    }

    #[test]
    fn test_metrics_disabled_returns_none() {
        let config = PipelineConfig::builder()
            .collect_metrics(false)
            .build()
            .unwrap();
        let pipeline = quiet_pipeline(config);

        let df = df! { "x" => &[1.0, 2.0, 3.0] }.unwrap();
        let output = pipeline.run(df).unwrap();
        assert!(output.metrics.is_none());
    }

    #[test]
    fn test_identity_column_never_leaks() {
        let pipeline = quiet_pipeline(PipelineConfig::default());
        let df = df! { "x" => &[1.0, 2.0, 3.0] }.unwrap();
        let output = pipeline.run(df).unwrap();
        assert!(output
            .table
            .get_column_names()
            .iter()
            .all(|n| n.as_str() != crate::pipeline::target::ROW_ID_COLUMN));
    }

    #[test]
    fn test_detach_event_reports_target() {
        let sink = Arc::new(MemorySink::new());
        let config = PipelineConfig::builder()
            .enabled_stages(vec![StageKind::Scaling])
            .target_column("y")
            .build()
            .unwrap();
        let pipeline = Pipeline::builder()
            .config(config)
            .event_sink(sink.clone())
            .build()
            .unwrap();

        let df = df! {
            "x" => &[1.0, 2.0],
            "y" => &[3.0, 4.0],
        }
        .unwrap();
        pipeline.run(df).unwrap();

        let events = sink.take();
        assert!(events
            .iter()
            .any(|e| e.stage.is_none() && e.message == "detached target 'y' (2 values)"));
    }

    #[test]
    fn test_memory_sink_sees_stage_boundaries() {
        let sink = Arc::new(MemorySink::new());
        let config = PipelineConfig::builder()
            .enabled_stages(vec![StageKind::Scaling])
            .build()
            .unwrap();
        let pipeline = Pipeline::builder()
            .config(config)
            .event_sink(sink.clone())
            .build()
            .unwrap();

        let df = df! { "x" => &[1.0, 2.0] }.unwrap();
        pipeline.run(df).unwrap();

        let events = sink.take();
        assert!(events
            .iter()
            .any(|e| e.stage == Some(StageKind::Scaling) && e.message == "stage started"));
        assert!(events
            .iter()
            .any(|e| e.stage.is_none() && e.message.starts_with("run complete")));
    }
}
