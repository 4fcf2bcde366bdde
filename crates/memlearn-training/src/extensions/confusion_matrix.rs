use crate::error::{TrainingError, TrainingResult};
use crate::iterator::SerialIterator;
use crate::trainer::{Extension, PRIORITY_WRITER, TrainContext, Trigger};
use crate::updater::{VALIDATION_ACCURACY, VALIDATION_LOSS};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Counts of (actual, predicted) label pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// `counts[actual][predicted]`
    counts: Vec<Vec<u64>>,
}

impl ConfusionMatrix {
    #[must_use]
    pub fn new(num_classes: usize) -> Self {
        Self { counts: vec![vec![0; num_classes]; num_classes] }
    }

    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn counts(&self) -> &[Vec<u64>] {
        &self.counts
    }

    pub fn record(&mut self, actual: usize, predicted: usize) -> TrainingResult<()> {
        let n = self.num_classes();
        if actual >= n || predicted >= n {
            return Err(TrainingError::extension(
                "ConfusionMatrix",
                format!("label pair ({actual}, {predicted}) is outside 0..{n}"),
            ));
        }
        self.counts[actual][predicted] += 1;
        Ok(())
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    #[must_use]
    pub fn correct(&self) -> u64 {
        (0..self.num_classes()).map(|i| self.counts[i][i]).sum()
    }

    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 { 0.0 } else { self.correct() as f64 / total as f64 }
    }

    /// Fraction of predictions of `class` that were right; `None` if never predicted.
    #[must_use]
    pub fn precision(&self, class: usize) -> Option<f64> {
        let predicted: u64 = self.counts.iter().map(|row| row[class]).sum();
        (predicted > 0).then(|| self.counts[class][class] as f64 / predicted as f64)
    }

    /// Fraction of `class` examples that were found; `None` if the class is absent.
    #[must_use]
    pub fn recall(&self, class: usize) -> Option<f64> {
        let actual: u64 = self.counts[class].iter().sum();
        (actual > 0).then(|| self.counts[class][class] as f64 / actual as f64)
    }

    /// Text table with actual labels as rows and predictions as columns.
    #[must_use]
    pub fn render(&self) -> String {
        let width = self.total().to_string().len().max(4);
        let mut out = String::new();
        let _ = write!(out, "{:>11}", "actual\\pred");
        for p in 0..self.num_classes() {
            let _ = write!(out, " {p:>width$}");
        }
        out.push('\n');
        for (a, row) in self.counts.iter().enumerate() {
            let _ = write!(out, "{a:>11}");
            for count in row {
                let _ = write!(out, " {count:>width$}");
            }
            out.push('\n');
        }
        out
    }
}

/// Matrix of one evaluation pass, as stored in `confusion_matrix.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochConfusion {
    pub epoch: u64,
    pub iteration: u64,
    pub loss: f64,
    pub accuracy: f64,
    pub matrix: ConfusionMatrix,
}

/// Evaluates the test set every epoch and reports validation loss and accuracy.
pub struct ConfusionMatrixEvaluator {
    iterator: SerialIterator,
    num_classes: usize,
    history: Vec<EpochConfusion>,
}

impl ConfusionMatrixEvaluator {
    #[must_use]
    pub fn new(iterator: SerialIterator, num_classes: usize) -> Self {
        Self { iterator, num_classes, history: Vec::new() }
    }

    #[must_use]
    pub fn history(&self) -> &[EpochConfusion] {
        &self.history
    }

    fn evaluate(&mut self, ctx: &TrainContext<'_>) -> TrainingResult<(f64, ConfusionMatrix)> {
        self.iterator.reset();
        let mut matrix = ConfusionMatrix::new(self.num_classes);
        let mut loss_sum = 0.0;
        let mut seen = 0usize;

        while let Some(indices) = self.iterator.next_batch() {
            let batch = self.iterator.dataset().collate(&indices)?;
            let eval = ctx.updater.evaluate(&batch)?;
            loss_sum += eval.loss * batch.len() as f64;
            seen += batch.len();
            for (&label, &predicted) in eval.labels.iter().zip(&eval.predictions) {
                matrix.record(label.max(0) as usize, predicted)?;
            }
        }

        if seen == 0 {
            return Err(TrainingError::extension("ConfusionMatrix", "test set is empty"));
        }
        Ok((loss_sum / seen as f64, matrix))
    }
}

impl Extension for ConfusionMatrixEvaluator {
    fn name(&self) -> &str {
        "ConfusionMatrix"
    }

    fn trigger(&self) -> Trigger {
        Trigger::epochs(1)
    }

    fn priority(&self) -> i32 {
        PRIORITY_WRITER
    }

    fn on_trigger(&mut self, ctx: &mut TrainContext<'_>) -> TrainingResult<()> {
        let (loss, matrix) = self.evaluate(ctx)?;
        let accuracy = matrix.accuracy();

        ctx.state.observation.insert(VALIDATION_LOSS.to_string(), loss);
        ctx.state.observation.insert(VALIDATION_ACCURACY.to_string(), accuracy);

        println!("confusion matrix (epoch {}):", ctx.state.epoch);
        print!("{}", matrix.render());

        self.history.push(EpochConfusion {
            epoch: ctx.state.epoch,
            iteration: ctx.state.iteration,
            loss,
            accuracy,
            matrix,
        });
        std::fs::write(ctx.layout.confusion_matrix_path(), serde_json::to_string_pretty(&self.history)?)?;

        tracing::debug!(epoch = ctx.state.epoch, loss, accuracy, "evaluated test set");
        Ok(())
    }

    fn state(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.history).ok()
    }

    fn restore(&mut self, state: serde_json::Value) -> TrainingResult<()> {
        self.history = serde_json::from_value(state)?;
        Ok(())
    }
}
