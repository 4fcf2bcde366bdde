//! train-vgg - train a windowed feature-vector classifier
//!
//! Prepares train/test sets from a dataset catalog, trains a VGG-style (or
//! MLP) classifier with Adam and writes logs, plots and snapshots under the
//! output directory.

mod commands;
mod config;

use anyhow::{Context, Result, bail};
use clap::Parser;
use memlearn_training::{MISSING_TEST_MESSAGE, ModelKind, TrainConfig};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use config::CliConfig;

const DEFAULT_DATASET: &str = "/data/data_filtered.json";
const DEFAULT_OUT: &str = "result";

/// Train a classifier over windowed time-slice feature vectors
#[derive(Parser, Debug)]
#[command(name = "train-vgg", author, version, about)]
struct Args {
    /// Number of examples in each mini-batch
    #[arg(short, long, default_value_t = 100)]
    batchsize: usize,

    /// Number of sweeps over the dataset to train
    #[arg(short, long, default_value_t = 20)]
    epoch: u64,

    /// Frequency of taking a snapshot, in epochs (-1 for every epoch)
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    frequency: i64,

    /// GPU id (negative value indicates CPU)
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    gpu: i32,

    /// Directory to output the result
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Resume the training from snapshot
    #[arg(short, long, default_value = "")]
    resume: String,

    /// Datasets to train on (default: every dataset not used for testing)
    #[arg(short = 'i', long, num_args = 1..)]
    train: Vec<String>,

    /// Datasets to test on
    #[arg(short, long, num_args = 1..)]
    test: Vec<String>,

    /// Number of consecutive time slices merged into one example
    #[arg(short, long, default_value_t = 1)]
    sliceb: usize,

    /// List available datasets and exit
    #[arg(long = "list_dataset")]
    list_dataset: bool,

    /// Dataset catalog file
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Model architecture (vgg, mlp)
    #[arg(long)]
    model: Option<ModelKind>,

    /// Number of classes
    #[arg(long, default_value_t = 2)]
    classes: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    lr: f64,

    /// Seed for shuffling and weight initialization
    #[arg(long)]
    seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Args {
    fn into_train_config(self, cli_config: &CliConfig, dataset: PathBuf) -> Result<TrainConfig> {
        let model = match (self.model, &cli_config.model) {
            (Some(model), _) => model,
            (None, Some(name)) => name.parse().context("invalid model in config file")?,
            (None, None) => ModelKind::Vgg,
        };

        Ok(TrainConfig {
            batch_size: self.batchsize,
            epochs: self.epoch,
            frequency: self.frequency,
            gpu: self.gpu,
            out: self.out.or_else(|| cli_config.out.clone()).unwrap_or_else(|| PathBuf::from(DEFAULT_OUT)),
            resume: (!self.resume.is_empty()).then(|| PathBuf::from(self.resume)),
            train: self.train,
            test: self.test,
            slice_merge: self.sliceb,
            dataset,
            model,
            num_classes: self.classes,
            learning_rate: self.lr,
            seed: self.seed.or(cli_config.seed).unwrap_or(0),
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cli_config = config::load_config();

    // Initialize tracing
    let level = match args.log_level.as_deref().or(cli_config.log_level.as_deref()).unwrap_or("info") {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let dataset = args
        .dataset
        .clone()
        .or_else(|| cli_config.dataset.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET));

    if args.list_dataset {
        return commands::datasets::execute(&dataset);
    }
    if args.test.is_empty() {
        bail!(MISSING_TEST_MESSAGE);
    }

    let train_config = args.into_train_config(&cli_config, dataset)?;
    commands::train::execute(&train_config)
}
