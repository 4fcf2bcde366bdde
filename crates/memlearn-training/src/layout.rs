use crate::error::TrainingResult;
use std::path::{Path, PathBuf};

/// Filesystem layout of a training run's output directory.
///
/// ```text
/// <out>/log
/// <out>/cg.dot
/// <out>/confusion_matrix.json
/// <out>/loss.png, <out>/accuracy.png
/// <out>/snapshot_iter_<N>/{model.bin, optimizer.bin, trainer.json}
/// <out>/manifest.json
/// ```
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.root.join("log")
    }

    #[must_use]
    pub fn graph_path(&self) -> PathBuf {
        self.root.join("cg.dot")
    }

    #[must_use]
    pub fn confusion_matrix_path(&self) -> PathBuf {
        self.root.join("confusion_matrix.json")
    }

    #[must_use]
    pub fn plot_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    #[must_use]
    pub fn snapshot_dir(&self, iteration: u64) -> PathBuf {
        self.root.join(format!("snapshot_iter_{iteration}"))
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    /// Snapshot directories currently present, ordered by iteration.
    pub fn snapshot_dirs(&self) -> TrainingResult<Vec<PathBuf>> {
        let dir = match std::fs::read_dir(&self.root) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found: Vec<(u64, PathBuf)> = Vec::new();
        for entry in dir {
            let path = entry?.path();
            let iteration = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("snapshot_iter_"))
                .and_then(|n| n.parse::<u64>().ok());
            if let (Some(iteration), true) = (iteration, path.is_dir()) {
                found.push((iteration, path));
            }
        }
        found.sort();
        Ok(found.into_iter().map(|(_, p)| p).collect())
    }

    pub fn ensure_dirs(&self) -> TrainingResult<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }
}

/// Files inside one snapshot directory.
#[derive(Debug, Clone)]
pub struct SnapshotLayout {
    dir: PathBuf,
}

impl SnapshotLayout {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record path without extension; the bin recorder appends `.bin`.
    #[must_use]
    pub fn model_record(&self) -> PathBuf {
        self.dir.join("model")
    }

    #[must_use]
    pub fn optimizer_record(&self) -> PathBuf {
        self.dir.join("optimizer")
    }

    #[must_use]
    pub fn model_file(&self) -> PathBuf {
        self.dir.join("model.bin")
    }

    #[must_use]
    pub fn optimizer_file(&self) -> PathBuf {
        self.dir.join("optimizer.bin")
    }

    #[must_use]
    pub fn trainer_state(&self) -> PathBuf {
        self.dir.join("trainer.json")
    }
}
