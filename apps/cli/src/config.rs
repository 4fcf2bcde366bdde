//! Config file support.
//!
//! Defaults for a few flags can live in TOML files:
//! 1. Global config (~/.memlearn/config.toml)
//! 2. Local config (./.memlearnrc)
//!
//! Local config overrides global config; CLI flags override both.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Dataset catalog file
    #[serde(default)]
    pub dataset: Option<PathBuf>,

    /// Output directory
    #[serde(default)]
    pub out: Option<PathBuf>,

    /// Log level
    #[serde(default)]
    pub log_level: Option<String>,

    /// Shuffle and weight init seed
    #[serde(default)]
    pub seed: Option<u64>,

    /// Model architecture (vgg, mlp)
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Error)]
pub enum CliConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),
}

pub type CliConfigResult<T> = std::result::Result<T, CliConfigError>;

impl CliConfig {
    pub fn load_from_file(path: &Path) -> CliConfigResult<Self> {
        if !path.exists() {
            return Err(CliConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| CliConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&content).map_err(|e| CliConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".memlearn")
            .join("config.toml")
    }

    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".memlearnrc")
    }

    /// Load the global then the local config. Missing files are skipped;
    /// unreadable ones are reported and skipped.
    pub fn discover_and_load() -> Self {
        let mut config = Self::default();
        for path in [Self::default_global_path(), Self::default_local_path()] {
            match Self::load_from_file(&path) {
                Ok(found) => config.merge(&found),
                Err(CliConfigError::NotFound(_)) => {}
                Err(e) => eprintln!("warning: ignoring config: {e}"),
            }
        }
        config
    }

    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &Self) {
        if let Some(ref dataset) = other.dataset {
            self.dataset = Some(dataset.clone());
        }
        if let Some(ref out) = other.out {
            self.out = Some(out.clone());
        }
        if let Some(ref log_level) = other.log_level {
            self.log_level = Some(log_level.clone());
        }
        if let Some(seed) = other.seed {
            self.seed = Some(seed);
        }
        if let Some(ref model) = other.model {
            self.model = Some(model.clone());
        }
    }
}

pub fn load_config() -> CliConfig {
    CliConfig::discover_and_load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file_parses_known_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "dataset = \"/tmp/catalog.json\"\nseed = 7\nmodel = \"mlp\"\n").unwrap();

        let config = CliConfig::load_from_file(&path).unwrap();
        assert_eq!(config.dataset, Some(PathBuf::from("/tmp/catalog.json")));
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.model.as_deref(), Some("mlp"));
        assert_eq!(config.out, None);
    }

    #[test]
    fn test_load_from_file_errors() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            CliConfig::load_from_file(&temp.path().join("missing.toml")),
            Err(CliConfigError::NotFound(_))
        ));

        let bad = temp.path().join("bad.toml");
        std::fs::write(&bad, "seed = \"seven\"").unwrap();
        assert!(matches!(CliConfig::load_from_file(&bad), Err(CliConfigError::ParseError(_))));
    }

    #[test]
    fn test_merge_prefers_other_when_set() {
        let mut base = CliConfig { out: Some(PathBuf::from("a")), seed: Some(1), ..Default::default() };
        let local = CliConfig { seed: Some(2), log_level: Some("debug".to_string()), ..Default::default() };
        base.merge(&local);

        assert_eq!(base.out, Some(PathBuf::from("a")));
        assert_eq!(base.seed, Some(2));
        assert_eq!(base.log_level.as_deref(), Some("debug"));
    }
}
