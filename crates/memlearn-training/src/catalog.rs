use crate::error::{TrainingError, TrainingResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One named recording and its class label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub label: i32,
}

/// The dataset catalog: a JSON array of `[name, label]` pairs.
///
/// Feature files live next to the catalog as `<name>.json`.
#[derive(Debug, Clone)]
pub struct DatasetCatalog {
    root: PathBuf,
    entries: Vec<CatalogEntry>,
}

impl DatasetCatalog {
    pub fn load(path: &Path) -> TrainingResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            TrainingError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read dataset catalog {}: {e}", path.display()),
            ))
        })?;
        let pairs: Vec<(String, i32)> = serde_json::from_slice(&bytes).map_err(|e| {
            TrainingError::Dataset(format!("failed to parse dataset catalog {}: {e}", path.display()))
        })?;

        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_pairs(root, pairs)
    }

    pub fn from_pairs(root: PathBuf, pairs: Vec<(String, i32)>) -> TrainingResult<Self> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(pairs.len());
        for (name, label) in pairs {
            if !seen.insert(name.clone()) {
                return Err(TrainingError::Dataset(format!("duplicate catalog entry: {name}")));
            }
            entries.push(CatalogEntry { name, label });
        }
        Ok(Self { root, entries })
    }

    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Directory holding the per-entry feature files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get(&self, name: &str) -> TrainingResult<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| TrainingError::UnknownDataset(name.to_string()))
    }

    #[must_use]
    pub fn features_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    /// `"<name> <label>"`, one line per entry, in catalog order.
    #[must_use]
    pub fn listing(&self) -> Vec<String> {
        self.entries.iter().map(|e| format!("{} {}", e.name, e.label)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_catalog_and_listing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("catalog.json");
        std::fs::write(&path, r#"[["kbeast", 1], ["idle", 0]]"#).unwrap();

        let catalog = DatasetCatalog::load(&path).unwrap();
        assert_eq!(catalog.entries().len(), 2);
        assert_eq!(catalog.listing(), vec!["kbeast 1".to_string(), "idle 0".to_string()]);
        assert_eq!(catalog.features_path("idle"), temp.path().join("idle.json"));
    }

    #[test]
    fn test_unknown_name_is_error() {
        let catalog = DatasetCatalog::from_pairs(PathBuf::new(), vec![("a".to_string(), 0)]).unwrap();
        assert!(matches!(catalog.get("b"), Err(TrainingError::UnknownDataset(name)) if name == "b"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let pairs = vec![("a".to_string(), 0), ("a".to_string(), 1)];
        assert!(DatasetCatalog::from_pairs(PathBuf::new(), pairs).is_err());
    }

    #[test]
    fn test_missing_catalog_is_io_error() {
        let temp = TempDir::new().unwrap();
        let err = DatasetCatalog::load(&temp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, TrainingError::Io(_)));
    }
}
