//! # Flowers17
//!
//! Dataset tooling for a flower image-classification experiment on the
//! Oxford 17 flowers index.
//!
//! ## Modules
//!
//! - `dataset`: Class tables, stratified splitting and augmenting image feeds
//! - `persistence`: Named model artifacts and training histories on disk
//! - `config`: The experiment configuration, loadable from TOML
//! - `utils`: Logging, errors and charts
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowers17::{ExperimentConfig, DatasetSplits, FeedSet};
//!
//! let config = ExperimentConfig::load("experiment.toml".as_ref())?;
//! let splits = DatasetSplits::from_index_file(
//!     config.index_path(),
//!     &config.dataset.classes,
//!     &config.split,
//! )?;
//! let mut feeds = FeedSet::from_splits(&splits, &config.dataset.base_dir, &config.feed)?;
//! let batch = feeds.train.next_batch()?;
//! ```

pub mod config;
pub mod dataset;
pub mod persistence;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::{DatasetConfig, ExperimentConfig, StorageConfig};
pub use dataset::classes::{ClassSpec, ClassTable, FlowerType};
pub use dataset::feed::{FeedBatch, FeedConfig, FeedSet, ImageFeed};
pub use dataset::split::{DatasetSplits, LabeledRecord, Partition, SplitConfig};
pub use persistence::{HistoryStore, ModelStore, TrainingHistory};
pub use utils::error::{FlowerError, Result};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
