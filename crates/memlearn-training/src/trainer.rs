//! The training loop and the extension protocol.
//!
//! A [`Trainer`] drives an [`Updater`] until the configured number of epochs
//! has passed. After every update it hands an explicit [`TrainContext`] to
//! each registered [`Extension`] whose [`Trigger`] fires. Extensions run by
//! priority, then registration order.

use crate::error::{TrainingError, TrainingResult};
use crate::layout::{RunLayout, SnapshotLayout};
use crate::updater::{Observation, Updater, UpdaterSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const PRIORITY_WRITER: i32 = 300;
pub const PRIORITY_EDITOR: i32 = 200;
pub const PRIORITY_READER: i32 = 100;
/// Snapshots see the state after every other extension has run.
pub const PRIORITY_SNAPSHOT: i32 = -100;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerUnit {
    Epoch,
    Iteration,
}

/// Fires every `period` epochs or iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub period: u64,
    pub unit: TriggerUnit,
}

impl Trigger {
    #[must_use]
    pub fn epochs(period: u64) -> Self {
        Self { period: period.max(1), unit: TriggerUnit::Epoch }
    }

    #[must_use]
    pub fn iterations(period: u64) -> Self {
        Self { period: period.max(1), unit: TriggerUnit::Iteration }
    }

    #[must_use]
    pub fn fires(&self, state: &TrainerState) -> bool {
        match self.unit {
            TriggerUnit::Epoch => state.previous_epoch / self.period != state.epoch / self.period,
            TriggerUnit::Iteration => state.iteration > 0 && state.iteration % self.period == 0,
        }
    }
}

/// One per-epoch row of the training log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub epoch: u64,
    pub iteration: u64,
    pub elapsed_time: f64,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl LogEntry {
    /// Look up a column by key; `epoch`, `iteration` and `elapsed_time` included.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        match key {
            "epoch" => Some(self.epoch as f64),
            "iteration" => Some(self.iteration as f64),
            "elapsed_time" => Some(self.elapsed_time),
            _ => self.values.get(key).copied(),
        }
    }
}

/// Mutable loop state shared with extensions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainerState {
    pub iteration: u64,
    pub epoch: u64,
    /// Epoch count before the latest update.
    pub previous_epoch: u64,
    pub epoch_detail: f64,
    pub is_new_epoch: bool,
    /// Seconds spent in `run`, carried across resumes.
    pub elapsed_time: f64,
    /// Values reported during the latest iteration.
    #[serde(skip)]
    pub observation: Observation,
    pub log: Vec<LogEntry>,
}

/// What an extension sees when it is invoked.
pub struct TrainContext<'a> {
    pub updater: &'a dyn Updater,
    pub state: &'a mut TrainerState,
    pub layout: &'a RunLayout,
    pub max_epochs: u64,
    snapshot_requested: bool,
}

impl TrainContext<'_> {
    /// Ask the trainer to write a snapshot once every extension has run.
    pub fn request_snapshot(&mut self) {
        self.snapshot_requested = true;
    }
}

pub trait Extension {
    /// Unique name; keys the extension's state inside snapshots.
    fn name(&self) -> &str;

    fn trigger(&self) -> Trigger {
        Trigger::epochs(1)
    }

    fn priority(&self) -> i32 {
        PRIORITY_READER
    }

    fn initialize(&mut self, _ctx: &mut TrainContext<'_>) -> TrainingResult<()> {
        Ok(())
    }

    fn on_trigger(&mut self, ctx: &mut TrainContext<'_>) -> TrainingResult<()>;

    fn finalize(&mut self, _ctx: &mut TrainContext<'_>) -> TrainingResult<()> {
        Ok(())
    }

    /// State to persist in snapshots, if any.
    fn state(&self) -> Option<serde_json::Value> {
        None
    }

    fn restore(&mut self, _state: serde_json::Value) -> TrainingResult<()> {
        Ok(())
    }
}

/// Contents of `trainer.json` inside a snapshot directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerSnapshot {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub state: TrainerState,
    pub updater: UpdaterSnapshot,
    #[serde(default)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

pub struct Trainer<U: Updater> {
    updater: U,
    max_epochs: u64,
    layout: RunLayout,
    state: TrainerState,
    extensions: Vec<Box<dyn Extension>>,
    snapshots: Vec<PathBuf>,
}

impl<U: Updater> Trainer<U> {
    pub fn new(updater: U, max_epochs: u64, out: PathBuf) -> Self {
        Self {
            updater,
            max_epochs,
            layout: RunLayout::new(out),
            state: TrainerState::default(),
            extensions: Vec::new(),
            snapshots: Vec::new(),
        }
    }

    /// Register an extension. Registration order breaks priority ties.
    pub fn extend<E: Extension + 'static>(&mut self, extension: E) {
        self.extensions.push(Box::new(extension));
    }

    #[must_use]
    pub fn updater(&self) -> &U {
        &self.updater
    }

    #[must_use]
    pub fn state(&self) -> &TrainerState {
        &self.state
    }

    #[must_use]
    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    /// Snapshot directories written by this trainer so far.
    #[must_use]
    pub fn snapshots(&self) -> &[PathBuf] {
        &self.snapshots
    }

    fn invocation_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.extensions.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(self.extensions[i].priority()));
        order
    }

    /// Restore trainer, iterator, model and optimizer state from a snapshot directory.
    pub fn resume(&mut self, path: &Path) -> TrainingResult<()> {
        let dir = if path.is_file() { path.parent().map(Path::to_path_buf).unwrap_or_default() } else { path.to_path_buf() };
        let snapshot_layout = SnapshotLayout::new(dir);

        let bytes = std::fs::read(snapshot_layout.trainer_state()).map_err(|e| {
            TrainingError::Checkpoint(format!("failed to read snapshot {}: {e}", snapshot_layout.dir().display()))
        })?;
        let snapshot: TrainerSnapshot = serde_json::from_slice(&bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(TrainingError::Checkpoint(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }

        self.updater.load_snapshot(&snapshot_layout, &snapshot.updater)?;
        self.state = snapshot.state;
        for ext in &mut self.extensions {
            if let Some(state) = snapshot.extensions.get(ext.name()) {
                ext.restore(state.clone())?;
            }
        }

        tracing::info!(
            snapshot = %snapshot_layout.dir().display(),
            epoch = self.state.epoch,
            iteration = self.state.iteration,
            "resumed from snapshot"
        );
        Ok(())
    }

    fn save_snapshot(&mut self) -> TrainingResult<PathBuf> {
        let dir = self.layout.snapshot_dir(self.state.iteration);
        let snapshot_layout = SnapshotLayout::new(dir.clone());
        let updater = self.updater.save_snapshot(&snapshot_layout)?;

        let extensions = self
            .extensions
            .iter()
            .filter_map(|e| e.state().map(|s| (e.name().to_string(), s)))
            .collect();
        let snapshot = TrainerSnapshot {
            version: SNAPSHOT_VERSION,
            created_at: Utc::now(),
            state: self.state.clone(),
            updater,
            extensions,
        };
        std::fs::write(snapshot_layout.trainer_state(), serde_json::to_string_pretty(&snapshot)?)?;

        tracing::debug!(snapshot = %dir.display(), "wrote snapshot");
        self.snapshots.push(dir.clone());
        Ok(dir)
    }

    /// Train until `max_epochs` epochs have completed.
    pub fn run(&mut self) -> TrainingResult<()> {
        self.layout.ensure_dirs()?;
        let order = self.invocation_order();
        let started = Instant::now();
        let base_elapsed = self.state.elapsed_time;

        for &i in &order {
            let mut ctx = TrainContext {
                updater: &self.updater,
                state: &mut self.state,
                layout: &self.layout,
                max_epochs: self.max_epochs,
                snapshot_requested: false,
            };
            self.extensions[i].initialize(&mut ctx)?;
        }

        tracing::info!(
            max_epochs = self.max_epochs,
            start_epoch = self.state.epoch,
            out = %self.layout.root().display(),
            "training started"
        );

        while self.state.epoch < self.max_epochs {
            let observation = self.updater.update()?;

            self.state.previous_epoch = self.state.epoch;
            self.state.iteration = self.updater.iteration();
            self.state.epoch = self.updater.epoch();
            self.state.epoch_detail = self.updater.epoch_detail();
            self.state.is_new_epoch = self.updater.is_new_epoch();
            self.state.elapsed_time = base_elapsed + started.elapsed().as_secs_f64();
            self.state.observation = observation;

            let mut snapshot_requested = false;
            for &i in &order {
                let ext = &mut self.extensions[i];
                if !ext.trigger().fires(&self.state) {
                    continue;
                }
                let mut ctx = TrainContext {
                    updater: &self.updater,
                    state: &mut self.state,
                    layout: &self.layout,
                    max_epochs: self.max_epochs,
                    snapshot_requested: false,
                };
                ext.on_trigger(&mut ctx)?;
                snapshot_requested |= ctx.snapshot_requested;
            }

            if snapshot_requested {
                self.save_snapshot()?;
            }
        }

        for &i in &order {
            let mut ctx = TrainContext {
                updater: &self.updater,
                state: &mut self.state,
                layout: &self.layout,
                max_epochs: self.max_epochs,
                snapshot_requested: false,
            };
            self.extensions[i].finalize(&mut ctx)?;
        }

        tracing::info!(epoch = self.state.epoch, iteration = self.state.iteration, "training finished");
        Ok(())
    }
}
