use crate::artifacts::sha256_file;
use crate::backend::{ADBackend, Device, TrainBackend};
use crate::dataset::Batch;
use crate::error::{TrainingError, TrainingResult};
use crate::iterator::{IteratorState, SerialIterator};
use crate::layout::SnapshotLayout;
use crate::models::{Classifier, LayerNode, ModelSignature};
use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{GradientsParams, Optimizer};
use burn::record::{BinFileRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Int, Tensor, TensorData};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Values reported during one iteration, keyed like `main/loss`.
pub type Observation = BTreeMap<String, f64>;

pub const MAIN_LOSS: &str = "main/loss";
pub const MAIN_ACCURACY: &str = "main/accuracy";
pub const VALIDATION_LOSS: &str = "validation/main/loss";
pub const VALIDATION_ACCURACY: &str = "validation/main/accuracy";

type SnapshotRecorder = BinFileRecorder<FullPrecisionSettings>;

/// Result of evaluating one batch without gradients.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEvaluation {
    /// Mean cross-entropy over the batch.
    pub loss: f64,
    pub predictions: Vec<usize>,
    pub labels: Vec<i32>,
}

/// Updater-owned part of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterSnapshot {
    pub iteration: u64,
    pub iterator: IteratorState,
    pub model: ModelSignature,
    pub model_sha256: String,
    pub optimizer_sha256: String,
}

/// One optimization step per call, plus the model access extensions need.
pub trait Updater {
    fn update(&mut self) -> TrainingResult<Observation>;

    fn iteration(&self) -> u64;
    fn epoch(&self) -> u64;
    fn epoch_detail(&self) -> f64;
    fn is_new_epoch(&self) -> bool;
    fn iterations_per_epoch(&self) -> u64;

    /// Evaluate a batch with the current parameters, outside of autodiff.
    fn evaluate(&self, batch: &Batch) -> TrainingResult<BatchEvaluation>;

    fn graph(&self) -> Vec<LayerNode>;
    fn signature(&self) -> &ModelSignature;

    fn save_snapshot(&self, layout: &SnapshotLayout) -> TrainingResult<UpdaterSnapshot>;
    fn load_snapshot(&mut self, layout: &SnapshotLayout, state: &UpdaterSnapshot) -> TrainingResult<()>;
}

/// Softmax cross-entropy training over a repeating iterator with a fixed learning rate.
pub struct StandardUpdater<M, O> {
    model: M,
    optimizer: O,
    iterator: SerialIterator,
    device: Device,
    learning_rate: f64,
    iteration: u64,
    signature: ModelSignature,
}

impl<M, O> StandardUpdater<M, O>
where
    M: AutodiffModule<ADBackend> + Classifier<ADBackend>,
    M::InnerModule: Classifier<TrainBackend>,
    O: Optimizer<M, ADBackend> + Clone,
{
    pub fn new(
        model: M,
        optimizer: O,
        iterator: SerialIterator,
        device: Device,
        learning_rate: f64,
        signature: ModelSignature,
    ) -> Self {
        Self { model, optimizer, iterator, device, learning_rate, iteration: 0, signature }
    }

    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }
}

fn batch_tensors<B: Backend>(batch: &Batch, device: &B::Device) -> (Tensor<B, 3>, Tensor<B, 1, Int>) {
    let n = batch.len();
    let inputs = Tensor::<B, 3>::from_data(TensorData::new(batch.inputs.clone(), [n, 1, batch.width]), device);
    let labels: Vec<i64> = batch.labels.iter().map(|&l| i64::from(l)).collect();
    let targets = Tensor::<B, 1, Int>::from_data(TensorData::new(labels, [n]), device);
    (inputs, targets)
}

fn predictions<B: Backend>(logits: Tensor<B, 2>) -> Tensor<B, 1, Int> {
    let n = logits.dims()[0];
    logits.argmax(1).reshape([n])
}

fn accuracy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> f64 {
    let n = targets.dims()[0];
    if n == 0 {
        return 0.0;
    }
    let correct = predictions(logits).equal(targets).int().sum().into_scalar().elem::<f64>();
    correct / n as f64
}

impl<M, O> Updater for StandardUpdater<M, O>
where
    M: AutodiffModule<ADBackend> + Classifier<ADBackend>,
    M::InnerModule: Classifier<TrainBackend>,
    O: Optimizer<M, ADBackend> + Clone,
{
    fn update(&mut self) -> TrainingResult<Observation> {
        let indices = self
            .iterator
            .next_batch()
            .ok_or_else(|| TrainingError::Dataset("training iterator is exhausted".to_string()))?;
        let batch = self.iterator.dataset().collate(&indices)?;
        let (inputs, targets) = batch_tensors::<ADBackend>(&batch, &self.device);

        let logits = self.model.forward(inputs);
        let loss = CrossEntropyLossConfig::new().init::<ADBackend>(&self.device).forward(logits.clone(), targets.clone());
        let accuracy = accuracy(logits.detach(), targets);
        let loss_value = loss.clone().into_scalar().elem::<f64>();
        if !loss_value.is_finite() {
            return Err(TrainingError::Model(format!("loss became {loss_value} at iteration {}", self.iteration + 1)));
        }

        let grads = GradientsParams::from_grads(loss.backward(), &self.model);
        self.model = self.optimizer.step(self.learning_rate, self.model.clone(), grads);
        self.iteration += 1;

        let mut observation = Observation::new();
        observation.insert(MAIN_LOSS.to_string(), loss_value);
        observation.insert(MAIN_ACCURACY.to_string(), accuracy);
        Ok(observation)
    }

    fn iteration(&self) -> u64 {
        self.iteration
    }

    fn epoch(&self) -> u64 {
        self.iterator.epoch()
    }

    fn epoch_detail(&self) -> f64 {
        self.iterator.epoch_detail()
    }

    fn is_new_epoch(&self) -> bool {
        self.iterator.is_new_epoch()
    }

    fn iterations_per_epoch(&self) -> u64 {
        self.iterator.iterations_per_epoch()
    }

    fn evaluate(&self, batch: &Batch) -> TrainingResult<BatchEvaluation> {
        let model = self.model.valid();
        let (inputs, targets) = batch_tensors::<TrainBackend>(batch, &self.device);

        let logits = model.forward(inputs);
        let loss = CrossEntropyLossConfig::new().init::<TrainBackend>(&self.device).forward(logits.clone(), targets);
        let predictions = predictions(logits)
            .into_data()
            .convert::<i64>()
            .to_vec::<i64>()
            .map_err(|e| TrainingError::Model(format!("failed to read predictions: {e:?}")))?;

        Ok(BatchEvaluation {
            loss: loss.into_scalar().elem::<f64>(),
            predictions: predictions.into_iter().map(|p| p.max(0) as usize).collect(),
            labels: batch.labels.clone(),
        })
    }

    fn graph(&self) -> Vec<LayerNode> {
        self.model.graph()
    }

    fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    fn save_snapshot(&self, layout: &SnapshotLayout) -> TrainingResult<UpdaterSnapshot> {
        std::fs::create_dir_all(layout.dir())?;
        let recorder = SnapshotRecorder::new();

        self.model
            .clone()
            .save_file(layout.model_record(), &recorder)
            .map_err(|e| TrainingError::recorder(&e))?;
        <SnapshotRecorder as Recorder<ADBackend>>::record(&recorder, self.optimizer.to_record(), layout.optimizer_record())
            .map_err(|e| TrainingError::recorder(&e))?;

        Ok(UpdaterSnapshot {
            iteration: self.iteration,
            iterator: self.iterator.state(),
            model: self.signature.clone(),
            model_sha256: sha256_file(&layout.model_file())?,
            optimizer_sha256: sha256_file(&layout.optimizer_file())?,
        })
    }

    fn load_snapshot(&mut self, layout: &SnapshotLayout, state: &UpdaterSnapshot) -> TrainingResult<()> {
        if state.model != self.signature {
            return Err(TrainingError::Checkpoint(format!(
                "snapshot {} was written for model {:?} but the current model is {:?}",
                layout.dir().display(),
                state.model,
                self.signature
            )));
        }
        for (file, expected) in [(layout.model_file(), &state.model_sha256), (layout.optimizer_file(), &state.optimizer_sha256)] {
            let actual = sha256_file(&file)
                .map_err(|e| TrainingError::Checkpoint(format!("failed to read {}: {e}", file.display())))?;
            if &actual != expected {
                return Err(TrainingError::Checkpoint(format!("{} is corrupted (sha256 mismatch)", file.display())));
            }
        }

        let recorder = SnapshotRecorder::new();
        self.model = self
            .model
            .clone()
            .load_file(layout.model_record(), &recorder, &self.device)
            .map_err(|e| TrainingError::recorder(&e))?;
        let record: O::Record =
            <SnapshotRecorder as Recorder<ADBackend>>::load(&recorder, layout.optimizer_record(), &self.device)
                .map_err(|e| TrainingError::recorder(&e))?;
        self.optimizer = self.optimizer.clone().load_record(record);

        self.iteration = state.iteration;
        self.iterator.restore(state.iterator.clone())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MemoryDataset;
    use crate::models::{Mlp, MlpConfig, ModelKind};
    use burn::optim::AdamConfig;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn updater(seed: u64) -> impl Updater {
        crate::backend::seed(seed);
        let device = crate::backend::select_device(-1).unwrap();
        let vectors = (0..8).map(|i| vec![i as f32 / 8.0, 1.0 - i as f32 / 8.0]).collect();
        let labels = (0..8).map(|i| i32::from(i >= 4)).collect();
        let dataset = Arc::new(MemoryDataset::from_parts(vectors, labels).unwrap());

        let model = Mlp::<ADBackend>::new(&MlpConfig::new(2, 2), &device);
        let signature = ModelSignature::of::<ADBackend, _>(ModelKind::Mlp, 2, 2, &model);
        let optimizer = AdamConfig::new().init();
        let iterator = SerialIterator::new(dataset, 4, true, true, seed);
        StandardUpdater::new(model, optimizer, iterator, device, 1e-3, signature)
    }

    #[test]
    fn test_update_reports_loss_and_accuracy() {
        let mut up = updater(0);
        let obs = up.update().unwrap();
        assert!(obs[MAIN_LOSS].is_finite());
        assert!((0.0..=1.0).contains(&obs[MAIN_ACCURACY]));
        assert_eq!(up.iteration(), 1);
        assert_eq!(up.epoch(), 0);
        up.update().unwrap();
        assert_eq!(up.epoch(), 1);
        assert!(up.is_new_epoch());
    }

    #[test]
    fn test_evaluate_returns_prediction_per_example() {
        let up = updater(0);
        let batch = Batch { inputs: vec![0.0, 1.0, 1.0, 0.0, 0.5, 0.5], labels: vec![0, 1, 0], width: 2 };
        let eval = up.evaluate(&batch).unwrap();
        assert_eq!(eval.predictions.len(), 3);
        assert!(eval.predictions.iter().all(|&p| p < 2));
        assert_eq!(eval.labels, vec![0, 1, 0]);
    }

    #[test]
    fn test_snapshot_round_trip_restores_iteration() {
        let temp = TempDir::new().unwrap();
        let layout = SnapshotLayout::new(temp.path().join("snap"));

        let mut up = updater(3);
        up.update().unwrap();
        up.update().unwrap();
        up.update().unwrap();
        let snap = up.save_snapshot(&layout).unwrap();
        assert!(layout.model_file().exists());
        assert!(layout.optimizer_file().exists());

        let mut resumed = updater(3);
        resumed.load_snapshot(&layout, &snap).unwrap();
        assert_eq!(resumed.iteration(), 3);
        assert_eq!(resumed.epoch(), up.epoch());
    }

    #[test]
    fn test_snapshot_with_other_signature_is_rejected() {
        let temp = TempDir::new().unwrap();
        let layout = SnapshotLayout::new(temp.path().join("snap"));
        let up = updater(1);
        let mut snap = up.save_snapshot(&layout).unwrap();
        snap.model.input_width = 99;

        let mut other = updater(1);
        let err = other.load_snapshot(&layout, &snap).unwrap_err();
        assert!(matches!(err, TrainingError::Checkpoint(_)));
    }
}
