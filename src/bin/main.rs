//! svmkit Command Line Interface
//!
//! Train, apply and inspect SVM models stored in the LIBSVM model format,
//! reading data in the LIBSVM sparse format.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;
use svmkit::api::{EvaluationMetrics, ModelInfo, TrainedModel, SVM};
use svmkit::core::{KernelType, Result, SVMError, SvmType};
use svmkit::{Dataset, LibSVMDataset, SvmModel};

#[derive(Parser)]
#[command(name = "svmkit")]
#[command(about = "Support Vector Machine training and prediction")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new SVM model, or cross-validate with --folds
    Train(TrainArgs),
    /// Make predictions using a trained model
    Predict(PredictArgs),
    /// Display model information
    Info(InfoArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliSvmType {
    #[value(name = "c-svc")]
    CSvc,
    #[value(name = "nu-svc")]
    NuSvc,
    #[value(name = "one-class")]
    OneClass,
    #[value(name = "epsilon-svr")]
    EpsilonSvr,
    #[value(name = "nu-svr")]
    NuSvr,
}

impl From<CliSvmType> for SvmType {
    fn from(cli_type: CliSvmType) -> Self {
        match cli_type {
            CliSvmType::CSvc => SvmType::CSvc,
            CliSvmType::NuSvc => SvmType::NuSvc,
            CliSvmType::OneClass => SvmType::OneClass,
            CliSvmType::EpsilonSvr => SvmType::EpsilonSvr,
            CliSvmType::NuSvr => SvmType::NuSvr,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliKernelType {
    /// u'v
    Linear,
    /// (gamma u'v + coef0)^degree
    #[value(name = "poly")]
    Polynomial,
    /// exp(-gamma |u-v|^2)
    Rbf,
    /// tanh(gamma u'v + coef0)
    Sigmoid,
}

impl From<CliKernelType> for KernelType {
    fn from(cli_kernel: CliKernelType) -> Self {
        match cli_kernel {
            CliKernelType::Linear => KernelType::Linear,
            CliKernelType::Polynomial => KernelType::Polynomial,
            CliKernelType::Rbf => KernelType::Rbf,
            CliKernelType::Sigmoid => KernelType::Sigmoid,
        }
    }
}

#[derive(Args)]
struct TrainArgs {
    /// Training data file (LibSVM format)
    #[arg(long)]
    data: PathBuf,

    /// Output model file (required unless --folds is given)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "c-svc")]
    svm_type: CliSvmType,

    #[arg(short, long, value_enum, default_value = "rbf")]
    kernel: CliKernelType,

    /// Polynomial degree
    #[arg(long, default_value = "3")]
    degree: i32,

    /// Kernel gamma (0 = 1/num_features)
    #[arg(short, long, default_value = "0")]
    gamma: f64,

    #[arg(long, default_value = "0")]
    coef0: f64,

    /// Regularization parameter C
    #[arg(short = 'C', long, default_value = "1.0")]
    c: f64,

    /// nu for nu-SVC, one-class and nu-SVR
    #[arg(long, default_value = "0.5")]
    nu: f64,

    /// Insensitive-loss width for epsilon-SVR
    #[arg(long, default_value = "0.1")]
    epsilon_loss: f64,

    /// Kernel cache size in MB
    #[arg(long, default_value = "100")]
    cache_size: f64,

    /// Stopping tolerance
    #[arg(short, long, default_value = "0.001")]
    tolerance: f64,

    #[arg(long)]
    no_shrinking: bool,

    /// Fit probability estimates
    #[arg(short, long)]
    probability: bool,

    /// Class weight as label:weight, repeatable
    #[arg(short, long, value_parser = parse_weight)]
    weight: Vec<(i32, f64)>,

    /// Report n-fold cross-validation instead of saving a model
    #[arg(long)]
    folds: Option<usize>,

    #[arg(long, default_value = "1")]
    seed: u64,
}

#[derive(Args)]
struct PredictArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Input data file
    #[arg(long)]
    data: PathBuf,

    /// Output predictions file (optional, prints to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output class probabilities
    #[arg(short, long)]
    probability: bool,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,

    /// Print the whole model as JSON
    #[arg(long)]
    json: bool,
}

fn parse_weight(s: &str) -> std::result::Result<(i32, f64), String> {
    let (label, weight) = s
        .split_once(':')
        .ok_or_else(|| format!("expected label:weight, got '{s}'"))?;
    let label = label
        .parse::<i32>()
        .map_err(|_| format!("invalid class label '{label}'"))?;
    let weight = weight
        .parse::<f64>()
        .map_err(|_| format!("invalid weight '{weight}'"))?;
    Ok((label, weight))
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Train(args) => train_command(args),
        Commands::Predict(args) => predict_command(args),
        Commands::Info(args) => info_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn build_svm(args: &TrainArgs) -> SVM {
    let mut svm = SVM::new()
        .with_svm_type(args.svm_type.into())
        .with_kernel_type(args.kernel.into())
        .with_degree(args.degree)
        .with_gamma(args.gamma)
        .with_coef0(args.coef0)
        .with_c(args.c)
        .with_nu(args.nu)
        .with_p(args.epsilon_loss)
        .with_cache_size(args.cache_size)
        .with_tolerance(args.tolerance)
        .with_shrinking(!args.no_shrinking)
        .with_probability(args.probability)
        .with_seed(args.seed);
    for &(label, weight) in &args.weight {
        svm = svm.with_weight(label, weight);
    }
    svm
}

fn print_metrics(svm_type: SvmType, metrics: &EvaluationMetrics, prefix: &str) {
    if svm_type.is_regression() {
        println!("{prefix}Mean squared error = {}", metrics.mean_squared_error());
        println!(
            "{prefix}Squared correlation coefficient = {}",
            metrics.squared_correlation()
        );
    } else {
        println!(
            "{prefix}Accuracy = {:.4}% ({}/{})",
            metrics.accuracy() * 100.0,
            metrics.correct,
            metrics.total
        );
    }
}

fn train_command(args: TrainArgs) -> Result<()> {
    info!("Training SVM model...");
    info!("Data file: {:?}", args.data);

    let dataset = LibSVMDataset::from_file(&args.data)?;
    info!(
        "Loaded {} samples with {} dimensions",
        dataset.len(),
        dataset.dim()
    );

    let svm = build_svm(&args);
    let svm_type = svm.param().svm_type;

    if let Some(folds) = args.folds {
        let metrics = svm.cross_validate(&dataset, folds)?;
        print_metrics(svm_type, &metrics, "Cross Validation ");
        return Ok(());
    }

    let output = args.output.as_ref().ok_or_else(|| {
        SVMError::InvalidParameter("--output is required unless --folds is given".to_string())
    })?;

    let model = svm.train(&dataset)?;
    info!("Training completed successfully");

    let model_info = model.info();
    info!("Support vectors: {}", model_info.total_sv);

    model.save(output)?;
    info!("Model saved to: {:?}", output);

    let metrics = model.evaluate(&dataset);
    if svm_type.is_regression() {
        info!("Training MSE: {:.6}", metrics.mean_squared_error());
    } else {
        info!("Training accuracy: {:.2}%", metrics.accuracy() * 100.0);
    }

    Ok(())
}

fn predict_command(args: PredictArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = TrainedModel::load(&args.model)?;
    let inner = model.inner();

    let with_probability = args.probability && inner.check_probability_model();
    if args.probability && !with_probability {
        return Err(SVMError::InvalidParameter(
            "model does not support probability estimates".to_string(),
        ));
    }

    info!("Loading prediction data from: {:?}", args.data);
    let dataset = LibSVMDataset::from_file(&args.data)?;

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let svm_type = inner.svm_type();
    if with_probability && svm_type.is_classification() {
        write!(writer, "labels")?;
        for label in inner.labels() {
            write!(writer, " {label}")?;
        }
        writeln!(writer)?;
    } else if with_probability && svm_type.is_regression() {
        info!(
            "Prob. model for test data: target value = predicted value + z, \
             z: Laplace distribution e^(-|z|/sigma)/(2sigma), sigma = {}",
            inner.svr_probability().unwrap_or_default()
        );
    }

    let mut predicted = Vec::with_capacity(dataset.len());
    for sample in dataset.samples() {
        let (value, probabilities) = if with_probability {
            inner.predict_probability(&sample.features)
        } else {
            (inner.predict(&sample.features), None)
        };
        write!(writer, "{value}")?;
        for p in probabilities.iter().flatten() {
            write!(writer, " {p}")?;
        }
        writeln!(writer)?;
        predicted.push(value);
    }
    writer.flush()?;
    drop(writer);

    let metrics = EvaluationMetrics::from_predictions(&predicted, &dataset.get_labels());
    if let Some(output_path) = &args.output {
        info!("Predictions saved to: {output_path:?}");
        print_metrics(svm_type, &metrics, "");
    } else if svm_type.is_regression() {
        info!("Mean squared error = {}", metrics.mean_squared_error());
    } else {
        info!("Accuracy = {:.4}%", metrics.accuracy() * 100.0);
    }

    Ok(())
}

fn print_info(info: &ModelInfo) {
    println!("=== SVM Model Summary ===");
    println!("SVM Type: {}", info.svm_type);
    println!("Kernel Type: {}", info.kernel_type);
    println!("Classes: {}", info.nr_class);
    if !info.labels.is_empty() {
        println!("Labels: {:?}", info.labels);
        println!("Support Vectors per Class: {:?}", info.n_sv);
    }
    println!("Support Vectors: {}", info.total_sv);
    println!("Rho: {:?}", info.rho);
    println!("Probability Estimates: {}", info.has_probability);
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = SvmModel::load(&args.model)?;

    if args.json {
        println!("{}", model.to_json()?);
    } else {
        print_info(&ModelInfo::from(&model));
    }

    Ok(())
}
