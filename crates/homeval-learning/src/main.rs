//! CLI entry point for house-price preparation, training and prediction.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use homeval_learning::evaluation::{self, EvaluationReport};
use homeval_learning::{
    ForestParams, MaxFeatures, PredictionContext, Predictor, REFERENCE_FILE, Trainer,
    TrainingConfig, TrainingOutcome,
};
use homeval_processing::{
    DatasetAnalysis, FeatureSchema, PipelineConfig, PreparationPipeline, ReferenceTables,
    RawRecord, io,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the default model directory.
const MODEL_DIR_ENV: &str = "HOMEVAL_MODEL_DIR";

const DEFAULT_RAW_DATA: &str = "datasets/ames-train.csv";
const DEFAULT_PROCESSED_DATA: &str = "datasets/processed/ames-train-clean.csv";
const DEFAULT_EVALUATION_DIR: &str = "evaluation";
const DEFAULT_ANALYSIS_REPORT: &str = "datasets/base-dataset-report.txt";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "House-price preparation, training and prediction",
    long_about = "Prepares Ames-style housing tables, trains a random-forest price model \
                  and estimates prices for new listings.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  HOMEVAL_MODEL_DIR     Default model directory (default: model)\n  \
                  RUST_LOG              Overrides --log-level\n\n\
                  EXAMPLES:\n  \
                  # Prepare, train and evaluate in one go\n  \
                  homeval run-all\n\n  \
                  # Estimate a single listing\n  \
                  homeval estimate --overall-qual 7 --gr-liv-area 1710 --neighborhood CollgCr\n\n  \
                  # Predict a CSV of listings\n  \
                  homeval predict -i datasets/ames-test.csv -o predictions.csv"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Suppress progress output (only show warnings, errors and results)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Directory holding the model artifact
    ///
    /// Defaults to $HOMEVAL_MODEL_DIR, then "model"
    #[arg(short, long, global = true)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean, engineer and encode a raw training table
    Prepare(PrepareArgs),
    /// Train the price model on a prepared table
    Train(TrainArgs),
    /// Predict prices for every row of a CSV file
    Predict(PredictArgs),
    /// Estimate the price of one listing from form fields
    Estimate(EstimateArgs),
    /// Evaluate the validation predictions written by `train`
    Evaluate(EvaluateArgs),
    /// Describe a raw table: column statistics and target correlations
    Analyze(AnalyzeArgs),
    /// Prepare, train and evaluate with default paths
    RunAll(RunAllArgs),
}

#[derive(Args, Debug)]
struct PrepareArgs {
    /// Raw CSV with a header row
    #[arg(short, long, default_value = DEFAULT_RAW_DATA)]
    input: PathBuf,

    /// Where to write the prepared CSV; reference tables go next to it
    #[arg(short, long, default_value = DEFAULT_PROCESSED_DATA)]
    output: PathBuf,

    /// Multiplier k of the target outlier fence [Q1 - k*IQR, Q3 + k*IQR]
    #[arg(long, default_value = "2.0")]
    iqr_multiplier: f64,

    /// Keep target outliers
    #[arg(long)]
    keep_outliers: bool,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Prepared CSV written by `prepare`
    #[arg(short, long, default_value = DEFAULT_PROCESSED_DATA)]
    data: PathBuf,

    /// Directory for the validation prediction files
    #[arg(long, default_value = DEFAULT_EVALUATION_DIR)]
    evaluation_dir: PathBuf,

    #[command(flatten)]
    training: TrainingOptions,
}

#[derive(Args, Debug)]
struct TrainingOptions {
    /// Number of trees
    #[arg(long, default_value = "100")]
    n_estimators: usize,

    /// Maximum tree depth (unlimited if omitted)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Minimum rows to split a node
    #[arg(long, default_value = "2")]
    min_samples_split: usize,

    /// Minimum rows in a leaf
    #[arg(long, default_value = "1")]
    min_samples_leaf: usize,

    /// Features tried per split: all, sqrt, log2 or a count
    #[arg(long, default_value = "all", value_parser = parse_max_features)]
    max_features: MaxFeatures,

    /// Search the default parameter grid with k-fold cross-validation
    #[arg(long)]
    grid_search: bool,

    /// Cross-validation folds for grid search
    #[arg(long, default_value = "5")]
    cv_folds: usize,

    /// Share of rows held out for validation
    #[arg(long, default_value = "0.2")]
    test_size: f64,

    /// Seed of the split and the forest
    #[arg(long, default_value = "2137")]
    seed: u64,
}

impl TrainingOptions {
    fn config(&self) -> Result<TrainingConfig> {
        let forest = ForestParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            ..Default::default()
        };
        Ok(TrainingConfig::builder()
            .forest(forest)
            .grid_search(self.grid_search)
            .cv_folds(self.cv_folds)
            .test_size(self.test_size)
            .random_seed(self.seed)
            .build()?)
    }
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// CSV of listings; the target column is ignored if present
    #[arg(short, long)]
    input: PathBuf,

    /// Output CSV with Id (when present) and the predicted price
    #[arg(short, long, default_value = "predictions.csv")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct EstimateArgs {
    /// Overall material and finish quality (1-10)
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u8).range(1..=10))]
    overall_qual: u8,

    /// Above-ground living area in square feet
    #[arg(long, default_value = "1500")]
    gr_liv_area: f64,

    /// Garage capacity in cars
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u8).range(0..=4))]
    garage_cars: u8,

    /// Total basement area in square feet
    #[arg(long, default_value = "800")]
    total_bsmt_sf: f64,

    /// Full bathrooms above grade
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u8).range(0..=3))]
    full_bath: u8,

    /// Original construction year
    #[arg(long, default_value = "1990", value_parser = clap::value_parser!(u16).range(1870..=2025))]
    year_built: u16,

    #[arg(long, default_value = "CollgCr")]
    neighborhood: String,

    #[arg(long, default_value = "2Story")]
    house_style: String,

    #[arg(long)]
    year_remod_add: Option<u16>,

    #[arg(long)]
    lot_area: Option<f64>,

    #[arg(long)]
    bedroom_abv_gr: Option<u8>,

    #[arg(long)]
    half_bath: Option<u8>,

    #[arg(long)]
    fireplaces: Option<u8>,

    /// First floor area in square feet
    #[arg(long = "first-flr-sf")]
    first_flr_sf: Option<f64>,

    /// Second floor area in square feet
    #[arg(long = "second-flr-sf")]
    second_flr_sf: Option<f64>,

    /// Kitchen quality (Ex, Gd, TA, Fa, Po)
    #[arg(long)]
    kitchen_qual: Option<String>,

    /// Exterior quality (Ex, Gd, TA, Fa, Po)
    #[arg(long)]
    exter_qual: Option<String>,

    /// Central air conditioning (Y or N)
    #[arg(long)]
    central_air: Option<String>,

    #[arg(long)]
    yr_sold: Option<u16>,

    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=12))]
    mo_sold: Option<u8>,

    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
    overall_cond: Option<u8>,

    /// Print the estimate as JSON
    #[arg(long)]
    json: bool,
}

impl EstimateArgs {
    fn record(&self) -> RawRecord {
        let number = |value: Option<u16>| value.map(f64::from);
        let small = |value: Option<u8>| value.map(f64::from);

        RawRecord::new()
            .with("OverallQual", f64::from(self.overall_qual))
            .with("GrLivArea", self.gr_liv_area)
            .with("GarageCars", f64::from(self.garage_cars))
            .with("TotalBsmtSF", self.total_bsmt_sf)
            .with("FullBath", f64::from(self.full_bath))
            .with("YearBuilt", f64::from(self.year_built))
            .with("Neighborhood", self.neighborhood.as_str())
            .with("HouseStyle", self.house_style.as_str())
            .with("YearRemodAdd", number(self.year_remod_add))
            .with("LotArea", self.lot_area)
            .with("BedroomAbvGr", small(self.bedroom_abv_gr))
            .with("HalfBath", small(self.half_bath))
            .with("Fireplaces", small(self.fireplaces))
            .with("1stFlrSF", self.first_flr_sf)
            .with("2ndFlrSF", self.second_flr_sf)
            .with("KitchenQual", self.kitchen_qual.clone())
            .with("ExterQual", self.exter_qual.clone())
            .with("CentralAir", self.central_air.clone())
            .with("YrSold", number(self.yr_sold))
            .with("MoSold", small(self.mo_sold))
            .with("OverallCond", small(self.overall_cond))
    }
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Directory with the validation files; the report is written there too
    #[arg(short, long, default_value = DEFAULT_EVALUATION_DIR)]
    dir: PathBuf,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Raw CSV to describe
    #[arg(short, long, default_value = DEFAULT_RAW_DATA)]
    input: PathBuf,

    /// Where to write the text report
    #[arg(short, long, default_value = DEFAULT_ANALYSIS_REPORT)]
    output: PathBuf,

    /// Target column to correlate against
    #[arg(short, long, default_value = homeval_processing::config::DEFAULT_TARGET_COLUMN)]
    target: String,
}

#[derive(Args, Debug)]
struct RunAllArgs {
    /// Raw training CSV
    #[arg(short, long, default_value = DEFAULT_RAW_DATA)]
    input: PathBuf,

    #[command(flatten)]
    training: TrainingOptions,
}

/// Initialize the tracing subscriber for logging.
fn init_logging(level: &str, quiet: bool) {
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
    // Load environment variables from .env file before reading any of them
    dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.quiet);

    let model_dir = cli
        .model_dir
        .clone()
        .or_else(|| std::env::var_os(MODEL_DIR_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("model"));

    match cli.command {
        Command::Prepare(args) => {
            prepare(&args.input, &args.output, args.iqr_multiplier, !args.keep_outliers)
        }
        Command::Train(args) => {
            train(&args.data, &model_dir, &args.evaluation_dir, &args.training).map(|_| ())
        }
        Command::Predict(args) => predict(&args, &model_dir),
        Command::Estimate(args) => estimate(&args, &model_dir),
        Command::Evaluate(args) => evaluate(&args.dir),
        Command::Analyze(args) => analyze(&args),
        Command::RunAll(args) => run_all(&args, &model_dir),
    }
}

fn header(title: &str) {
    println!("\n{}", "=".repeat(80));
    println!("{title}");
    println!("{}", "=".repeat(80));
}

fn prepare(input: &Path, output: &Path, iqr_multiplier: f64, remove_outliers: bool) -> Result<()> {
    let df = io::load_csv(input)?;
    info!("Loaded {} rows x {} columns from {}", df.height(), df.width(), input.display());

    let config = PipelineConfig::builder()
        .iqr_multiplier(iqr_multiplier)
        .remove_outliers(remove_outliers)
        .output_dir(output.parent().unwrap_or(Path::new(".")))
        .build()?;
    let pipeline = PreparationPipeline::builder().config(config).build()?;
    let mut prepared = pipeline.fit_transform(df)?;

    io::write_csv(&mut prepared.data, output)?;
    let reference_path = reference_path(output);
    prepared.reference.save(&reference_path)?;

    let summary = &prepared.summary;
    header("DATA PREPARATION SUMMARY");
    println!("  Rows:               {} -> {}", summary.rows_before, summary.rows_after);
    println!("  Missing target:     {}", summary.missing_target_rows);
    println!("  Outliers removed:   {}", summary.outliers_removed);
    println!("  Imputed cells:      {}", summary.imputed_cells);
    println!("  Engineered:         {}", summary.engineered_features);
    println!("  Feature columns:    {}", prepared.schema.len());
    println!("  Prepared data:      {}", output.display());
    println!("  Reference tables:   {}", reference_path.display());
    Ok(())
}

/// Reference tables live next to the prepared CSV.
fn reference_path(processed_csv: &Path) -> PathBuf {
    processed_csv.with_file_name(REFERENCE_FILE)
}

fn train(
    data: &Path,
    model_dir: &Path,
    evaluation_dir: &Path,
    options: &TrainingOptions,
) -> Result<TrainingOutcome> {
    let config = options.config()?;
    let df = io::load_csv(data)?;
    let schema = FeatureSchema::from_processed_csv(data, &config.target_column, &config.id_column)?;
    let reference_path = reference_path(data);
    let reference = ReferenceTables::load(&reference_path).with_context(|| {
        format!(
            "Reference tables not found at {}: run `homeval prepare` first",
            reference_path.display()
        )
    })?;

    let trainer = Trainer::builder()
        .config(config)
        .on_progress(|update| {
            info!("[{}] {:.0}% - {}", update.stage, update.progress * 100.0, update.message)
        })
        .build()?;
    let outcome = trainer.train(&df, &schema, &reference)?;

    outcome.artifact.save(model_dir)?;
    fs::create_dir_all(evaluation_dir)?;
    evaluation::write_validation_files(&outcome.validation_set, evaluation_dir)?;

    let v = &outcome.validation;
    header("MODEL TRAINING RESULTS");
    println!("  Parameters:   {}", outcome.selected_params);
    if let Some(cv_mse) = outcome.cv_mse {
        println!("  CV RMSE:      ${:.2}", cv_mse.sqrt());
    }
    println!("  RMSE:         ${:.2}", v.rmse);
    println!("  MAE:          ${:.2}", v.mae);
    println!("  R-squared:    {:.4}", v.r2);
    println!("  MAPE:         {:.2}%", v.mape);
    println!("\n  Top features:");
    for (rank, feature) in outcome.artifact.metadata().top_features.iter().enumerate() {
        println!("  {:>3}. {:<30} {:.4}", rank + 1, feature.feature, feature.importance);
    }
    println!("\n  Model saved to {}", model_dir.display());
    Ok(outcome)
}

fn predict(args: &PredictArgs, model_dir: &Path) -> Result<()> {
    let context = PredictionContext::load(model_dir)?;
    let df = io::load_csv(&args.input)?;
    let batch = Predictor::new(&context).predict_frame(&df)?;

    let reference = context.artifact().reference();
    let mut out = batch.to_dataframe(&reference.id_column, &reference.target_column)?;
    io::write_csv(&mut out, &args.output)?;

    header("BATCH PREDICTION");
    println!("  Rows:        {}", df.height());
    println!("  Predicted:   {}", batch.predictions.len());
    println!("  Failed:      {}", batch.failures.len());
    for failure in &batch.failures {
        let id = failure.id.map_or_else(|| "-".to_string(), |id| id.to_string());
        warn!("Row {} (Id {}): {}", failure.row, id, failure.message);
    }
    println!("  Output:      {}", args.output.display());
    Ok(())
}

fn estimate(args: &EstimateArgs, model_dir: &Path) -> Result<()> {
    let context = PredictionContext::load(model_dir)?;
    let estimate = Predictor::new(&context).predict_record(&args.record())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
        return Ok(());
    }

    header("PRICE ESTIMATE");
    println!("  Estimated sale price:   ${:.2}", estimate.price);
    println!("  Price per sqft:         ${:.2}", estimate.price_per_sqft);
    println!(
        "  Confidence range:       ${:.0} - ${:.0}",
        estimate.confidence_low, estimate.confidence_high
    );
    Ok(())
}

fn evaluate(dir: &Path) -> Result<()> {
    let report = EvaluationReport::from_dir(dir)?;
    report.write(dir)?;
    println!("{}", report.render());
    Ok(())
}

fn analyze(args: &AnalyzeArgs) -> Result<()> {
    let df = io::load_csv(&args.input)?;
    let analysis = DatasetAnalysis::analyze(&df, &args.target)?;
    let report = analysis.render_report();

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&args.output, &report)?;
    println!("{report}");
    info!("Analysis report saved to {}", args.output.display());
    Ok(())
}

fn run_all(args: &RunAllArgs, model_dir: &Path) -> Result<()> {
    if !args.input.is_file() {
        bail!("Input file not found: {}", args.input.display());
    }
    let processed = PathBuf::from(DEFAULT_PROCESSED_DATA);
    let evaluation_dir = PathBuf::from(DEFAULT_EVALUATION_DIR);

    header("Step 1: Data Preparation");
    prepare(
        &args.input,
        &processed,
        homeval_processing::config::DEFAULT_IQR_MULTIPLIER,
        true,
    )?;

    header("Step 2: Model Training");
    train(&processed, model_dir, &evaluation_dir, &args.training)?;

    header("Step 3: Evaluation");
    evaluate(&evaluation_dir)?;

    println!("\nPipeline complete. Estimate a listing with `homeval estimate --help`.");
    Ok(())
}

fn parse_max_features(value: &str) -> Result<MaxFeatures, String> {
    match value {
        "all" => Ok(MaxFeatures::All),
        "sqrt" => Ok(MaxFeatures::Sqrt),
        "log2" => Ok(MaxFeatures::Log2),
        other => match other.parse::<usize>() {
            Ok(count) if count > 0 => Ok(MaxFeatures::Count(count)),
            _ => other
                .parse::<f64>()
                .ok()
                .filter(|f| *f > 0.0 && *f <= 1.0)
                .map(MaxFeatures::Fraction)
                .ok_or_else(|| format!("expected all, sqrt, log2, a count or a fraction, got '{other}'")),
        },
    }
}
