use crate::artifacts::{ArtifactKind, RunArtifact, RunId, RunManifest, RunMetrics, make_artifact};
use crate::backend::{ADBackend, Device, TrainBackend, seed, select_device};
use crate::builders::{WindowOptions, prep_windowed_datasets};
use crate::dataset::MemoryDataset;
use crate::error::{TrainingError, TrainingResult};
use crate::extensions::{
    ConfusionMatrixEvaluator, DumpGraph, LogReport, PlotReport, PrintReport, ProgressBar, Snapshot,
};
use crate::iterator::SerialIterator;
use crate::layout::RunLayout;
use crate::models::{Classifier, Mlp, MlpConfig, ModelKind, ModelSignature, Vgg1d, Vgg1dConfig};
use crate::trainer::{Trainer, TrainerState};
use crate::updater::{MAIN_ACCURACY, MAIN_LOSS, StandardUpdater, VALIDATION_ACCURACY, VALIDATION_LOSS};
use burn::module::AutodiffModule;
use burn::optim::AdamConfig;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

pub const MISSING_TEST_MESSAGE: &str =
    "you have to specify at least one test, see --list_dataset for available datasets";

/// Columns printed once per epoch, in order.
pub const REPORT_COLUMNS: [&str; 6] =
    ["epoch", MAIN_LOSS, VALIDATION_LOSS, MAIN_ACCURACY, VALIDATION_ACCURACY, "elapsed_time"];

/// Resolved configuration of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub batch_size: usize,
    pub epochs: u64,
    /// Snapshot interval in epochs; non-positive means every epoch.
    pub frequency: i64,
    /// Negative selects the CPU.
    pub gpu: i32,
    pub out: PathBuf,
    pub resume: Option<PathBuf>,
    /// Empty selects every catalog entry that is not a test entry.
    pub train: Vec<String>,
    pub test: Vec<String>,
    pub slice_merge: usize,
    pub dataset: PathBuf,
    pub model: ModelKind,
    pub num_classes: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            epochs: 20,
            frequency: -1,
            gpu: -1,
            out: PathBuf::from("result"),
            resume: None,
            train: Vec::new(),
            test: Vec::new(),
            slice_merge: 1,
            dataset: PathBuf::from("/data/data_filtered.json"),
            model: ModelKind::Vgg,
            num_classes: 2,
            learning_rate: 1e-3,
            seed: 0,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> TrainingResult<()> {
        if self.test.is_empty() {
            return Err(TrainingError::InvalidConfig(MISSING_TEST_MESSAGE.to_string()));
        }
        if self.batch_size == 0 {
            return Err(TrainingError::InvalidConfig("batchsize must be >= 1".to_string()));
        }
        if self.epochs == 0 {
            return Err(TrainingError::InvalidConfig("epoch must be >= 1".to_string()));
        }
        if self.slice_merge == 0 {
            return Err(TrainingError::InvalidConfig("sliceb must be >= 1".to_string()));
        }
        if self.num_classes < 2 {
            return Err(TrainingError::InvalidConfig("classes must be >= 2".to_string()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(TrainingError::InvalidConfig("lr must be > 0".to_string()));
        }
        Ok(())
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub manifest: RunManifest,
    pub snapshots: Vec<PathBuf>,
}

/// Prepare data, build the model and train it to completion.
pub fn run(config: &TrainConfig) -> TrainingResult<RunOutcome> {
    config.validate()?;
    let device = select_device(config.gpu)?;
    seed(config.seed);

    let options = WindowOptions { slice_merge: config.slice_merge, num_classes: config.num_classes };
    let (train, test) = prep_windowed_datasets(&config.dataset, &config.test, &config.train, &options)?;

    match config.model {
        ModelKind::Vgg => {
            let model = Vgg1d::<ADBackend>::new(&Vgg1dConfig::new(config.num_classes), &device);
            train_model(config, ModelKind::Vgg, model, train, test, device)
        }
        ModelKind::Mlp => {
            let model = Mlp::<ADBackend>::new(&MlpConfig::new(train.width(), config.num_classes), &device);
            train_model(config, ModelKind::Mlp, model, train, test, device)
        }
    }
}

fn train_model<M>(
    config: &TrainConfig,
    kind: ModelKind,
    model: M,
    train: MemoryDataset,
    test: MemoryDataset,
    device: Device,
) -> TrainingResult<RunOutcome>
where
    M: AutodiffModule<ADBackend> + Classifier<ADBackend>,
    M::InnerModule: Classifier<TrainBackend>,
{
    let signature = ModelSignature::of::<ADBackend, _>(kind, train.width(), config.num_classes, &model);
    tracing::info!(model = %kind, params = signature.num_params, "model ready");

    let optimizer = AdamConfig::new().init::<ADBackend, M>();
    let train_iter = SerialIterator::new(Arc::new(train), config.batch_size, true, true, config.seed);
    let test_iter = SerialIterator::new(Arc::new(test), config.batch_size, false, false, config.seed);

    let updater =
        StandardUpdater::new(model, optimizer, train_iter, device, config.learning_rate, signature.clone());
    let mut trainer = Trainer::new(updater, config.epochs, config.out.clone());

    trainer.extend(ConfusionMatrixEvaluator::new(test_iter, config.num_classes));
    trainer.extend(DumpGraph::default());
    trainer.extend(Snapshot::every(config.frequency));
    trainer.extend(LogReport::default());
    if PlotReport::available() {
        trainer.extend(PlotReport::new([MAIN_LOSS, VALIDATION_LOSS], "loss.png"));
        trainer.extend(PlotReport::new([MAIN_ACCURACY, VALIDATION_ACCURACY], "accuracy.png"));
    }
    trainer.extend(PrintReport::new(REPORT_COLUMNS));
    trainer.extend(ProgressBar::default());

    if let Some(path) = &config.resume {
        trainer.resume(path)?;
    }
    trainer.run()?;

    let manifest = RunManifest {
        run_id: RunId::new(),
        created_at: Utc::now(),
        model: signature,
        config: serde_json::to_value(config)?,
        metrics: final_metrics(trainer.state()),
        artifacts: collect_artifacts(trainer.layout())?,
    };
    manifest.write(&trainer.layout().manifest_path())?;

    Ok(RunOutcome { manifest, snapshots: trainer.snapshots().to_vec() })
}

fn final_metrics(state: &TrainerState) -> RunMetrics {
    let last = state.log.last();
    let value = |key: &str| last.and_then(|e| e.get(key));
    RunMetrics {
        epoch: state.epoch,
        iteration: state.iteration,
        train_loss: value(MAIN_LOSS),
        train_accuracy: value(MAIN_ACCURACY),
        validation_loss: value(VALIDATION_LOSS),
        validation_accuracy: value(VALIDATION_ACCURACY),
        elapsed_time: state.elapsed_time,
    }
}

fn collect_artifacts(layout: &RunLayout) -> TrainingResult<Vec<RunArtifact>> {
    let mut artifacts = Vec::new();
    let files = [
        (ArtifactKind::Log, layout.log_path()),
        (ArtifactKind::Graph, layout.graph_path()),
        (ArtifactKind::ConfusionMatrix, layout.confusion_matrix_path()),
        (ArtifactKind::Plot, layout.plot_path("loss.png")),
        (ArtifactKind::Plot, layout.plot_path("accuracy.png")),
    ];
    for (kind, path) in files {
        if path.exists() {
            artifacts.push(make_artifact(kind, path)?);
        }
    }
    for dir in layout.snapshot_dirs()? {
        artifacts.push(make_artifact(ArtifactKind::Snapshot, dir)?);
    }
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_needs_a_test_set() {
        let err = TrainConfig::default().validate().unwrap_err();
        assert_eq!(err.to_string(), format!("invalid training configuration: {MISSING_TEST_MESSAGE}"));
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let base = TrainConfig { test: vec!["a".to_string()], ..Default::default() };
        assert!(base.validate().is_ok());
        assert!(TrainConfig { batch_size: 0, ..base.clone() }.validate().is_err());
        assert!(TrainConfig { slice_merge: 0, ..base.clone() }.validate().is_err());
        assert!(TrainConfig { num_classes: 1, ..base.clone() }.validate().is_err());
        assert!(TrainConfig { learning_rate: f64::NAN, ..base }.validate().is_err());
    }

    #[test]
    fn test_final_metrics_reads_last_entry() {
        let mut values = std::collections::BTreeMap::new();
        values.insert(MAIN_LOSS.to_string(), 0.25);
        values.insert(VALIDATION_ACCURACY.to_string(), 0.8);
        let state = TrainerState {
            epoch: 3,
            iteration: 12,
            log: vec![crate::trainer::LogEntry { epoch: 3, iteration: 12, elapsed_time: 1.5, values }],
            ..Default::default()
        };
        let metrics = final_metrics(&state);
        assert_eq!(metrics.train_loss, Some(0.25));
        assert_eq!(metrics.validation_accuracy, Some(0.8));
        assert_eq!(metrics.train_accuracy, None);
    }
}
