//! Dataset module for the flower index
//!
//! This module provides functionality for:
//! - Mapping index positions and filenames to flower classes
//! - Stratified train/test/validation partitioning
//! - Augmenting image feeds over the resulting partitions
//!
//! ## Split Strategy
//!
//! Each class occupies a fixed-size block of consecutive index lines. Blocks
//! are shuffled and split independently, so every partition keeps the class
//! balance of the whole index:
//! 1. **Train Set**: `floor(n * train_fraction)` images per class
//! 2. **Test Set**: `floor(n * test_fraction)` images per class
//! 3. **Validation Set**: whatever remains of each class

pub mod augmentation;
pub mod classes;
pub mod feed;
pub mod index;
pub mod split;

// Re-export main types for convenience
pub use augmentation::{AugmentationConfig, Augmenter, Transform};
pub use classes::{classify, parse_image_index, ClassSpec, ClassTable, FlowerType};
pub use feed::{ClassMode, FeedBatch, FeedConfig, FeedSet, ImageFeed};
pub use index::IndexFile;
pub use split::{split, DatasetSplits, LabeledRecord, Partition, SplitConfig, SplitStats};
