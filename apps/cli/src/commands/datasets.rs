//! `--list_dataset` implementation.

use anyhow::{Context, Result};
use memlearn_training::DatasetCatalog;
use std::path::Path;

pub fn execute(catalog_path: &Path) -> Result<()> {
    let catalog = DatasetCatalog::load(catalog_path)
        .with_context(|| format!("Failed to load dataset catalog {}", catalog_path.display()))?;

    for line in catalog.listing() {
        println!("{line}");
    }
    Ok(())
}
