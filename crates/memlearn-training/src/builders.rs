use crate::catalog::{CatalogEntry, DatasetCatalog};
use crate::dataset::MemoryDataset;
use crate::error::{TrainingError, TrainingResult};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct WindowOptions {
    /// Number of consecutive time slices merged into one example.
    pub slice_merge: usize,
    pub num_classes: usize,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self { slice_merge: 1, num_classes: 2 }
    }
}

/// Read one feature file: a JSON array of equally wide time slices.
pub fn json_to_vec(path: &Path) -> TrainingResult<Vec<Vec<f32>>> {
    let bytes = std::fs::read(path).map_err(|e| {
        TrainingError::Io(std::io::Error::new(e.kind(), format!("failed to read features {}: {e}", path.display())))
    })?;
    let slices: Vec<Vec<f32>> = serde_json::from_slice(&bytes)
        .map_err(|e| TrainingError::Dataset(format!("failed to parse features {}: {e}", path.display())))?;

    if let Some(first) = slices.first() {
        if let Some(idx) = slices.iter().position(|s| s.len() != first.len()) {
            return Err(TrainingError::Dataset(format!(
                "{}: slice {idx} has width {} (expected {})",
                path.display(),
                slices[idx].len(),
                first.len()
            )));
        }
    }
    Ok(slices)
}

/// Vectorize catalog entries slice by slice; each slice keeps its entry's label.
pub fn init_vec(catalog: &DatasetCatalog, entries: &[CatalogEntry]) -> TrainingResult<(Vec<Vec<f32>>, Vec<i32>)> {
    let mut vectors = Vec::new();
    let mut labels = Vec::new();
    for entry in entries {
        let slices = json_to_vec(&catalog.features_path(&entry.name))?;
        labels.extend(std::iter::repeat_n(entry.label, slices.len()));
        vectors.extend(slices);
    }
    Ok((vectors, labels))
}

/// Concatenate each run of `slice_merge` consecutive slices into one vector.
///
/// Windows do not overlap; a trailing run shorter than `slice_merge` is dropped.
#[must_use]
pub fn window_slices(slices: &[Vec<f32>], slice_merge: usize) -> Vec<Vec<f32>> {
    slices.chunks_exact(slice_merge.max(1)).map(|block| block.concat()).collect()
}

/// Build the train and test datasets from catalog names.
///
/// An empty `train_ids` selects every catalog entry that is not a test entry.
pub fn prep_windowed_datasets(
    source: &Path,
    test_ids: &[String],
    train_ids: &[String],
    options: &WindowOptions,
) -> TrainingResult<(MemoryDataset, MemoryDataset)> {
    if options.slice_merge == 0 {
        return Err(TrainingError::InvalidConfig("slice block size must be >= 1".to_string()));
    }
    if test_ids.is_empty() {
        return Err(TrainingError::InvalidConfig("at least one test dataset is required".to_string()));
    }

    let catalog = DatasetCatalog::load(source)?;

    let test_entries = resolve(&catalog, test_ids)?;
    let train_entries = if train_ids.is_empty() {
        catalog
            .entries()
            .iter()
            .filter(|e| !test_ids.contains(&e.name))
            .cloned()
            .collect()
    } else {
        resolve(&catalog, train_ids)?
    };

    for entry in &train_entries {
        if test_ids.contains(&entry.name) {
            tracing::warn!(dataset = %entry.name, "dataset is used for both training and testing");
        }
    }

    let train = build_windowed(&catalog, &train_entries, options)?;
    let test = build_windowed(&catalog, &test_entries, options)?;

    if train.is_empty() {
        return Err(TrainingError::Dataset("training set is empty".to_string()));
    }
    if test.is_empty() {
        return Err(TrainingError::Dataset("test set is empty".to_string()));
    }
    if train.width() != test.width() {
        return Err(TrainingError::Dataset(format!(
            "train vectors have width {} but test vectors have width {}",
            train.width(),
            test.width()
        )));
    }

    tracing::info!(
        train = train.len(),
        test = test.len(),
        width = train.width(),
        slice_merge = options.slice_merge,
        "prepared windowed datasets"
    );
    Ok((train, test))
}

fn resolve(catalog: &DatasetCatalog, names: &[String]) -> TrainingResult<Vec<CatalogEntry>> {
    names.iter().map(|name| catalog.get(name).cloned()).collect()
}

fn build_windowed(
    catalog: &DatasetCatalog,
    entries: &[CatalogEntry],
    options: &WindowOptions,
) -> TrainingResult<MemoryDataset> {
    let mut vectors = Vec::new();
    let mut labels = Vec::new();

    for entry in entries {
        let label_ok = usize::try_from(entry.label).is_ok_and(|l| l < options.num_classes);
        if !label_ok {
            return Err(TrainingError::Dataset(format!(
                "dataset {} has label {} outside 0..{}",
                entry.name, entry.label, options.num_classes
            )));
        }

        // Windows never span two entries.
        let (slices, mut entry_labels) = init_vec(catalog, std::slice::from_ref(entry))?;
        let windows = window_slices(&slices, options.slice_merge);
        tracing::debug!(dataset = %entry.name, slices = slices.len(), windows = windows.len(), "windowed dataset");
        entry_labels.truncate(windows.len());
        labels.extend(entry_labels);
        vectors.extend(windows);
    }

    MemoryDataset::from_parts(vectors, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_catalog(root: &Path) -> std::path::PathBuf {
        let catalog = root.join("catalog.json");
        std::fs::write(&catalog, r#"[["a", 0], ["b", 1], ["c", 1]]"#).unwrap();
        std::fs::write(root.join("a.json"), "[[0,1],[2,3],[4,5],[6,7],[8,9]]").unwrap();
        std::fs::write(root.join("b.json"), "[[1,1],[2,2],[3,3],[4,4]]").unwrap();
        std::fs::write(root.join("c.json"), "[[5,5],[6,6]]").unwrap();
        catalog
    }

    #[test]
    fn test_window_slices_drops_trailing_block() {
        let slices = vec![vec![0.0, 1.0], vec![2.0, 3.0], vec![4.0, 5.0]];
        assert_eq!(window_slices(&slices, 2), vec![vec![0.0, 1.0, 2.0, 3.0]]);
        assert_eq!(window_slices(&slices, 1).len(), 3);
    }

    #[test]
    fn test_init_vec_labels_every_slice() {
        let temp = TempDir::new().unwrap();
        let catalog = DatasetCatalog::load(&write_catalog(temp.path())).unwrap();
        let (vectors, labels) = init_vec(&catalog, catalog.entries()).unwrap();
        assert_eq!(vectors.len(), 11);
        assert_eq!(labels.iter().filter(|&&l| l == 0).count(), 5);
    }

    #[test]
    fn test_default_train_is_everything_but_test() {
        let temp = TempDir::new().unwrap();
        let source = write_catalog(temp.path());
        let opts = WindowOptions { slice_merge: 2, num_classes: 2 };

        let (train, test) = prep_windowed_datasets(&source, &["b".to_string()], &[], &opts).unwrap();
        // a: 5 slices -> 2 windows, c: 2 slices -> 1 window
        assert_eq!(train.len(), 3);
        assert_eq!(train.width(), 4);
        assert_eq!(test.len(), 2);
        assert_eq!(test.label_counts(2), vec![0, 2]);
    }

    #[test]
    fn test_windows_do_not_span_entries() {
        let temp = TempDir::new().unwrap();
        let source = write_catalog(temp.path());
        let opts = WindowOptions { slice_merge: 3, num_classes: 2 };
        let train_ids = vec!["a".to_string(), "b".to_string()];

        let (train, _) = prep_windowed_datasets(&source, &["a".to_string()], &train_ids, &opts).unwrap();
        // a: 5 slices -> 1 window, b: 4 slices -> 1 window
        assert_eq!(train.len(), 2);
        assert_eq!(train.label_counts(2), vec![1, 1]);
    }

    #[test]
    fn test_explicit_train_selection() {
        let temp = TempDir::new().unwrap();
        let source = write_catalog(temp.path());
        let (train, _) =
            prep_windowed_datasets(&source, &["b".to_string()], &["c".to_string()], &WindowOptions::default())
                .unwrap();
        assert_eq!(train.len(), 2);
        assert_eq!(train.label_counts(2), vec![0, 2]);
    }

    #[test]
    fn test_unknown_dataset_is_rejected() {
        let temp = TempDir::new().unwrap();
        let source = write_catalog(temp.path());
        let err = prep_windowed_datasets(&source, &["zzz".to_string()], &[], &WindowOptions::default()).unwrap_err();
        assert!(matches!(err, TrainingError::UnknownDataset(name) if name == "zzz"));
    }

    #[test]
    fn test_label_out_of_range_is_rejected() {
        let temp = TempDir::new().unwrap();
        let source = write_catalog(temp.path());
        let opts = WindowOptions { slice_merge: 1, num_classes: 1 };
        assert!(prep_windowed_datasets(&source, &["a".to_string()], &[], &opts).is_err());
    }

    #[test]
    fn test_preparation_is_deterministic() {
        let temp = TempDir::new().unwrap();
        let source = write_catalog(temp.path());
        let test = vec!["a".to_string()];
        let first = prep_windowed_datasets(&source, &test, &[], &WindowOptions::default()).unwrap();
        let second = prep_windowed_datasets(&source, &test, &[], &WindowOptions::default()).unwrap();
        assert_eq!(first, second);
    }
}
