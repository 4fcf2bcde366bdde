//! End-to-end runs over a small on-disk catalog.

use memlearn_training::{LogEntry, ModelKind, REPORT_COLUMNS, RunLayout, TrainConfig, TrainingError};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const WIDTH: usize = 4;

/// Four entries with six slices each; label 1 slices are shifted upwards.
fn write_catalog(dir: &Path) -> PathBuf {
    let entries = [("idle_a", 0), ("beast_a", 1), ("idle_b", 0), ("beast_b", 1)];
    for (i, (name, label)) in entries.iter().enumerate() {
        let slices: Vec<Vec<f32>> = (0..6)
            .map(|s| (0..WIDTH).map(|w| *label as f32 + 0.05 * (s + w + i) as f32).collect())
            .collect();
        std::fs::write(dir.join(format!("{name}.json")), serde_json::to_string(&slices).unwrap()).unwrap();
    }
    let catalog = dir.join("catalog.json");
    std::fs::write(&catalog, serde_json::to_string(&entries).unwrap()).unwrap();
    catalog
}

fn config(temp: &TempDir, epochs: u64) -> TrainConfig {
    TrainConfig {
        batch_size: 4,
        epochs,
        out: temp.path().join("result"),
        train: vec!["idle_a".to_string(), "beast_a".to_string()],
        test: vec!["idle_b".to_string(), "beast_b".to_string()],
        dataset: write_catalog(temp.path()),
        model: ModelKind::Mlp,
        ..Default::default()
    }
}

fn read_log(out: &Path) -> Vec<LogEntry> {
    serde_json::from_str(&std::fs::read_to_string(out.join("log")).unwrap()).unwrap()
}

#[test]
fn test_frequency_five_over_ten_epochs_writes_two_snapshots() {
    let temp = TempDir::new().unwrap();
    let cfg = TrainConfig { frequency: 5, ..config(&temp, 10) };

    let outcome = memlearn_training::run(&cfg).unwrap();

    let dirs = RunLayout::new(cfg.out.clone()).snapshot_dirs().unwrap();
    let names: Vec<_> = dirs.iter().map(|d| d.file_name().unwrap().to_string_lossy().to_string()).collect();
    // 12 training vectors in batches of 4: 3 iterations per epoch.
    assert_eq!(names, vec!["snapshot_iter_15", "snapshot_iter_30"]);
    assert_eq!(outcome.snapshots.len(), 2);
}

#[test]
fn test_default_frequency_snapshots_every_epoch() {
    let temp = TempDir::new().unwrap();
    let cfg = config(&temp, 3);

    let outcome = memlearn_training::run(&cfg).unwrap();

    assert_eq!(RunLayout::new(cfg.out.clone()).snapshot_dirs().unwrap().len(), 3);
    assert_eq!(outcome.manifest.metrics.epoch, 3);
    for dir in &outcome.snapshots {
        assert!(dir.join("model.bin").exists());
        assert!(dir.join("optimizer.bin").exists());
        assert!(dir.join("trainer.json").exists());
    }
}

#[test]
fn test_log_has_one_entry_per_epoch_with_report_columns() {
    let temp = TempDir::new().unwrap();
    let cfg = config(&temp, 2);

    memlearn_training::run(&cfg).unwrap();

    let log = read_log(&cfg.out);
    assert_eq!(log.iter().map(|e| e.epoch).collect::<Vec<_>>(), vec![1, 2]);
    for entry in &log {
        for column in REPORT_COLUMNS {
            assert!(entry.get(column).is_some(), "missing {column}");
        }
    }
    assert!(cfg.out.join("cg.dot").exists());
    assert!(cfg.out.join("confusion_matrix.json").exists());
    assert!(cfg.out.join("manifest.json").exists());
}

#[test]
fn test_resume_continues_to_target_epoch() {
    let temp = TempDir::new().unwrap();
    let first = config(&temp, 2);
    memlearn_training::run(&first).unwrap();

    let snapshot = first.out.join("snapshot_iter_6");
    let second = TrainConfig { epochs: 4, resume: Some(snapshot), ..first.clone() };
    let outcome = memlearn_training::run(&second).unwrap();

    assert_eq!(outcome.manifest.metrics.iteration, 12);
    let log = read_log(&second.out);
    assert_eq!(log.iter().map(|e| e.epoch).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    assert_eq!(outcome.snapshots.len(), 2);
}

#[test]
fn test_resume_with_other_model_fails() {
    let temp = TempDir::new().unwrap();
    let first = config(&temp, 1);
    memlearn_training::run(&first).unwrap();

    let second = TrainConfig {
        epochs: 2,
        model: ModelKind::Vgg,
        resume: Some(first.out.join("snapshot_iter_3")),
        ..first.clone()
    };
    let err = memlearn_training::run(&second).unwrap_err();
    assert!(matches!(err, TrainingError::Checkpoint(_)), "unexpected error: {err}");
}

#[test]
fn test_resume_with_larger_train_set_fails() {
    let temp = TempDir::new().unwrap();
    let first = TrainConfig { train: vec!["idle_a".to_string()], ..config(&temp, 1) };
    memlearn_training::run(&first).unwrap();

    // Same vector width, three times the examples.
    let second = TrainConfig {
        epochs: 2,
        train: vec!["idle_a".to_string(), "beast_a".to_string(), "idle_b".to_string()],
        resume: Some(first.out.join("snapshot_iter_2")),
        ..first.clone()
    };
    let err = memlearn_training::run(&second).unwrap_err();
    assert!(matches!(err, TrainingError::Checkpoint(_)), "unexpected error: {err}");
}

#[test]
fn test_vgg_run_dumps_convolution_graph() {
    let temp = TempDir::new().unwrap();
    let cfg = TrainConfig { model: ModelKind::Vgg, ..config(&temp, 1) };

    let outcome = memlearn_training::run(&cfg).unwrap();

    let dot = std::fs::read_to_string(cfg.out.join("cg.dot")).unwrap();
    assert!(dot.contains("Conv1d"));
    assert!(dot.contains("main/loss"));
    assert_eq!(outcome.manifest.model.kind, ModelKind::Vgg);
}

#[test]
fn test_unknown_test_dataset_is_rejected() {
    let temp = TempDir::new().unwrap();
    let cfg = TrainConfig { test: vec!["nope".to_string()], ..config(&temp, 1) };

    let err = memlearn_training::run(&cfg).unwrap_err();
    assert!(matches!(err, TrainingError::UnknownDataset(name) if name == "nope"));
    assert!(!cfg.out.exists());
}
