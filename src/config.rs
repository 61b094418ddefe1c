//! Experiment configuration.
//!
//! One explicit parameter structure replaces module-level constants. Every
//! field has a default, so a TOML file only needs the values it changes:
//!
//! ```toml
//! [dataset]
//! base_dir = "./data/17flowers"
//!
//! [split]
//! train_fraction = 0.7
//! seed = 42
//!
//! [feed]
//! batch_size = 16
//! target_size = [224, 224]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::classes::ClassTable;
use crate::dataset::feed::FeedConfig;
use crate::dataset::split::SplitConfig;
use crate::utils::error::{FlowerError, Result};
use crate::utils::logging::LogConfig;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub dataset: DatasetConfig,
    pub split: SplitConfig,
    pub feed: FeedConfig,
    pub storage: StorageConfig,
    pub logging: LogConfig,
}

/// Where the images and their index live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Directory holding the images
    pub base_dir: PathBuf,
    /// Index file name, relative to `base_dir` unless absolute
    pub index_file: PathBuf,
    /// Class blocks of the index file
    pub classes: ClassTable,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./data/17flowers"),
            index_file: PathBuf::from("files.txt"),
            classes: ClassTable::default(),
        }
    }
}

/// Artifact directories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub models_dir: PathBuf,
    pub history_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("./saved_models"),
            history_dir: PathBuf::from("./history_saves"),
        }
    }
}

impl ExperimentConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FlowerError::PathNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| FlowerError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| FlowerError::Serialization(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.split.fractions()?;
        self.dataset.classes.validate()?;
        self.feed.validate()?;
        Ok(())
    }

    /// Full path of the index file
    pub fn index_path(&self) -> PathBuf {
        if self.dataset.index_file.is_absolute() {
            self.dataset.index_file.clone()
        } else {
            self.dataset.base_dir.join(&self.dataset.index_file)
        }
    }
}
