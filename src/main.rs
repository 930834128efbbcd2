//! CLI entry point for the data cleaning pipeline.

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use prismaflow::{
    io, EncodingMethod, OutlierMethod, Pipeline, PipelineConfig, ScalingMethod, StageKind,
};
use tracing::{error, info};

/// CLI-compatible stage names
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliStage {
    ManualColumns,
    DropEmptyColumns,
    HandleNulls,
    FinalizeDtypes,
    HandleOutliers,
    Encoding,
    FeatureSelection,
    TemporalFeatures,
    Scaling,
}

impl From<CliStage> for StageKind {
    fn from(cli: CliStage) -> Self {
        match cli {
            CliStage::ManualColumns => StageKind::ManualColumns,
            CliStage::DropEmptyColumns => StageKind::DropEmptyColumns,
            CliStage::HandleNulls => StageKind::HandleNulls,
            CliStage::FinalizeDtypes => StageKind::FinalizeDtypes,
            CliStage::HandleOutliers => StageKind::HandleOutliers,
            CliStage::Encoding => StageKind::Encoding,
            CliStage::FeatureSelection => StageKind::FeatureSelection,
            CliStage::TemporalFeatures => StageKind::TemporalFeatures,
            CliStage::Scaling => StageKind::Scaling,
        }
    }
}

/// CLI-compatible outlier method enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutlierMethod {
    /// Interquartile-range bounds
    Iqr,
    /// Mean plus/minus t standard deviations
    Zscore,
    /// MAD-based modified Z-score
    ModifiedZscore,
}

impl From<CliOutlierMethod> for OutlierMethod {
    fn from(cli: CliOutlierMethod) -> Self {
        match cli {
            CliOutlierMethod::Iqr => OutlierMethod::Iqr,
            CliOutlierMethod::Zscore => OutlierMethod::Zscore,
            CliOutlierMethod::ModifiedZscore => OutlierMethod::ModifiedZscore,
        }
    }
}

/// CLI-compatible encoding method enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliEncodingMethod {
    /// Sorted-distinct integer codes
    Label,
    /// One 0/1 indicator column per value
    Onehot,
    /// Category replaced by mean target value
    Target,
}

impl From<CliEncodingMethod> for EncodingMethod {
    fn from(cli: CliEncodingMethod) -> Self {
        match cli {
            CliEncodingMethod::Label => EncodingMethod::Label,
            CliEncodingMethod::Onehot => EncodingMethod::Onehot,
            CliEncodingMethod::Target => EncodingMethod::Target,
        }
    }
}

/// CLI-compatible scaling method enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliScalingMethod {
    /// Zero mean, unit population stddev
    Standard,
    /// Rescale to [0, 1]
    Minmax,
}

impl From<CliScalingMethod> for ScalingMethod {
    fn from(cli: CliScalingMethod) -> Self {
        match cli {
            CliScalingMethod::Standard => ScalingMethod::Standard,
            CliScalingMethod::Minmax => ScalingMethod::Minmax,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Tabular data cleaning pipeline",
    long_about = "Runs a fixed sequence of cleaning stages over a CSV file.\n\n\
                  EXAMPLES:\n  \
                  # Clean with defaults\n  \
                  prismaflow -i data.csv -o cleaned.csv\n\n  \
                  # Keep a target column aligned through row drops\n  \
                  prismaflow -i data.csv -o cleaned.csv --target price\n\n  \
                  # Cap outliers instead of dropping rows\n  \
                  prismaflow -i data.csv -o cleaned.csv --cap-outliers --outlier-method zscore\n\n  \
                  # Run only two stages\n  \
                  prismaflow -i data.csv -o cleaned.csv --stages handle-nulls --stages scaling"
)]
struct Args {
    /// Path to the CSV file to clean
    #[arg(short, long)]
    input: String,

    /// Output CSV path
    #[arg(short, long, default_value = "./cleaned.csv")]
    output: String,

    /// Target column kept aligned through row drops
    #[arg(short, long)]
    target: Option<String>,

    /// Stages to run (repeatable); default is all nine in fixed order
    #[arg(long, value_enum)]
    stages: Vec<CliStage>,

    /// Columns to force-drop (repeatable)
    #[arg(long = "drop")]
    drop_columns: Vec<String>,

    /// Columns exempt from every drop/alter stage (repeatable)
    #[arg(long = "keep")]
    keep_columns: Vec<String>,

    /// Extra columns the outlier stage must skip (repeatable)
    #[arg(long)]
    skip_outliers: Vec<String>,

    /// Extra columns the scaling stage must skip (repeatable)
    #[arg(long)]
    skip_scaling: Vec<String>,

    /// Missingness ratio at or above which a column is imputed
    #[arg(long, default_value = "0.05")]
    null_threshold: f64,

    /// Outlier bound method
    #[arg(long, value_enum, default_value = "iqr")]
    outlier_method: CliOutlierMethod,

    /// Method parameter override (IQR k / Z-score t / modified Z threshold)
    #[arg(long)]
    outlier_param: Option<f64>,

    /// Cap outliers at the bound instead of dropping their rows
    #[arg(long)]
    cap_outliers: bool,

    /// Categorical encoding method
    #[arg(long, value_enum, default_value = "onehot")]
    encoding: CliEncodingMethod,

    /// Variance floor for feature selection
    #[arg(long, default_value = "0.01")]
    variance_threshold: f64,

    /// Absolute correlation ceiling for feature selection
    #[arg(long, default_value = "0.9")]
    correlation_threshold: f64,

    /// Numeric scaling method
    #[arg(long, value_enum, default_value = "standard")]
    scaling: CliScalingMethod,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and errors)
    #[arg(short, long)]
    quiet: bool,

    /// Print run metrics as JSON to stdout
    #[arg(long)]
    json: bool,

    /// Skip metrics collection entirely
    #[arg(long, conflicts_with = "json")]
    no_metrics: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled entirely so stdout only
/// carries the metrics JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.quiet, args.json);
    dotenv().ok();

    if !std::path::Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    info!("Loading dataset from: {}", args.input);
    let data = io::load_csv(&args.input)?;
    info!("Dataset loaded: {:?}", data.shape());

    let mut config_builder = PipelineConfig::builder()
        .manual_columns(args.drop_columns.clone())
        .columns_to_keep(args.keep_columns.clone())
        .outlier_skipping(args.skip_outliers.clone())
        .scaling_skipping(args.skip_scaling.clone())
        .null_threshold(args.null_threshold)
        .outlier_method(args.outlier_method.into())
        .outlier_drop(!args.cap_outliers)
        .encoding_method(args.encoding.into())
        .variance_threshold(args.variance_threshold)
        .correlation_threshold(args.correlation_threshold)
        .scaling_method(args.scaling.into())
        .collect_metrics(!args.no_metrics);

    if !args.stages.is_empty() {
        let stages: Vec<StageKind> = args.stages.iter().map(|s| StageKind::from(*s)).collect();
        config_builder = config_builder.enabled_stages(stages);
    }
    if let Some(param) = args.outlier_param {
        config_builder = config_builder.outlier_param(param);
    }
    if let Some(ref target) = args.target {
        config_builder = config_builder.target_column(target);
    }

    let config = config_builder.build()?;
    let pipeline = Pipeline::builder().config(config).build()?;

    let output = match pipeline.run(data) {
        Ok(output) => output,
        Err(e) => {
            error!("Pipeline failed: {}", e);
            return Err(anyhow!("Pipeline failed: {}", e));
        }
    };

    let mut table = output.table;
    io::export_csv(&mut table, &args.output)?;
    info!("Cleaned table written to: {}", args.output);

    if let Some(metrics) = output.metrics {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        } else {
            info!("{}", metrics.summary());
        }
    }

    Ok(())
}
