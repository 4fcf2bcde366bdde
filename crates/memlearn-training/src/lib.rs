//! Memlearn Training
//!
//! Supervised training of windowed feature-vector classifiers:
//! - Dataset catalog, vectorization and windowing
//! - VGG-style 1D convolutional and MLP classifiers on burn
//! - Serial iterators, a standard updater and an extensible trainer
//! - Evaluation, logging, plotting and snapshot extensions
//! - Run layout and manifests

pub mod artifacts;
pub mod backend;
pub mod builders;
pub mod catalog;
pub mod dataset;
pub mod error;
pub mod extensions;
pub mod iterator;
pub mod job;
pub mod layout;
pub mod models;
pub mod trainer;
pub mod updater;

pub use artifacts::{ArtifactKind, RunArtifact, RunId, RunManifest, RunMetrics};
pub use builders::{WindowOptions, init_vec, json_to_vec, prep_windowed_datasets};
pub use catalog::{CatalogEntry, DatasetCatalog};
pub use dataset::{Batch, MemoryDataset};
pub use error::{TrainingError, TrainingResult};
pub use iterator::{IteratorState, SerialIterator};
pub use job::{MISSING_TEST_MESSAGE, REPORT_COLUMNS, RunOutcome, TrainConfig, run};
pub use layout::{RunLayout, SnapshotLayout};
pub use models::{Classifier, ModelKind, ModelSignature};
pub use trainer::{Extension, LogEntry, TrainContext, Trainer, TrainerState, Trigger, TriggerUnit};
pub use updater::{StandardUpdater, Updater};
