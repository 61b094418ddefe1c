//! Augmenting image feeds over dataset partitions
//!
//! An [`ImageFeed`] turns a partition's records into batches of image tensors
//! and labels. Images are loaded lazily, resized to the target size,
//! augmented, then rescaled into flattened CHW `f32` data. Feeds cycle
//! endlessly; the order is reshuffled at every epoch boundary when shuffling
//! is enabled.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{ImageReader, RgbImage};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::augmentation::{AugmentationConfig, Augmenter};
use crate::dataset::split::{DatasetSplits, LabeledRecord, Partition};
use crate::utils::error::{FlowerError, Result};

/// How labels are encoded in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassMode {
    /// One-hot rows of length `num_classes`
    Categorical,
    /// One class index per image
    Sparse,
}

/// Configuration shared by the train, test and validation feeds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Multiplier applied to raw 0-255 pixel values
    pub rescale: f32,
    /// (width, height) every image is resized to
    pub target_size: (u32, u32),
    pub batch_size: usize,
    pub class_mode: ClassMode,
    /// Seed for shuffling and augmentation
    pub seed: Option<u64>,
    /// Random geometric augmentation
    pub augmentation: AugmentationConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            rescale: 1.0 / 255.0,
            target_size: (250, 250),
            batch_size: 10,
            class_mode: ClassMode::Categorical,
            seed: None,
            augmentation: AugmentationConfig::default(),
        }
    }
}

impl FeedConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(FlowerError::Config("Batch size must be greater than 0".to_string()));
        }
        if self.target_size.0 == 0 || self.target_size.1 == 0 {
            return Err(FlowerError::Config(format!(
                "Target size must be non-zero (got {}x{})",
                self.target_size.0, self.target_size.1
            )));
        }
        if !self.rescale.is_finite() {
            return Err(FlowerError::Config("Rescale factor must be finite".to_string()));
        }

        let aug = &self.augmentation;
        let ranges = [
            ("rotation_range", aug.rotation_range),
            ("width_shift_range", aug.width_shift_range),
            ("height_shift_range", aug.height_shift_range),
        ];
        for (name, value) in ranges {
            if !value.is_finite() || value < 0.0 {
                return Err(FlowerError::Config(format!(
                    "{} must be a non-negative number (got {})",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

/// One batch of images and labels
#[derive(Debug, Clone)]
pub struct FeedBatch {
    /// Flattened `[batch, 3, height, width]` pixel data
    pub images: Vec<f32>,
    /// One-hot `[batch, num_classes]` or sparse `[batch]` labels
    pub labels: Vec<f32>,
    /// Filenames in batch order
    pub filenames: Vec<String>,
    /// (channels, height, width) of each image
    pub image_shape: (usize, usize, usize),
}

impl FeedBatch {
    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }

    /// Full tensor shape `[batch, channels, height, width]`
    pub fn dims(&self) -> [usize; 4] {
        let (c, h, w) = self.image_shape;
        [self.len(), c, h, w]
    }
}

/// Batch generator over one partition
pub struct ImageFeed {
    records: Vec<LabeledRecord>,
    directory: PathBuf,
    num_classes: usize,
    config: FeedConfig,
    shuffle: bool,
    augmenter: Augmenter,
    order: Vec<usize>,
    position: usize,
    epoch: usize,
    rng: ChaCha8Rng,
}

impl ImageFeed {
    /// Create a feed reading `records` from `directory`
    pub fn new(
        records: Vec<LabeledRecord>,
        directory: impl Into<PathBuf>,
        num_classes: usize,
        config: FeedConfig,
        shuffle: bool,
    ) -> Result<Self> {
        config.validate()?;

        if let Some(bad) = records.iter().find(|r| r.label >= num_classes) {
            return Err(FlowerError::Dataset(format!(
                "Record '{}' has label {} but the feed only knows {} classes",
                bad.filename, bad.label, num_classes
            )));
        }

        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut order: Vec<usize> = (0..records.len()).collect();
        if shuffle {
            order.shuffle(&mut rng);
        }

        Ok(Self {
            records,
            directory: directory.into(),
            num_classes,
            augmenter: Augmenter::new(config.augmentation.clone()),
            config,
            shuffle,
            order,
            position: 0,
            epoch: 0,
            rng,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn shuffles(&self) -> bool {
        self.shuffle
    }

    /// Completed passes over the data
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Batches per epoch; the last batch may be short
    pub fn num_batches(&self) -> usize {
        self.records.len().div_ceil(self.config.batch_size)
    }

    /// Records of batch `index` in the current epoch order
    pub fn batch_records(&self, index: usize) -> Vec<&LabeledRecord> {
        let start = index * self.config.batch_size;
        let end = (start + self.config.batch_size).min(self.order.len());
        if start >= end {
            return Vec::new();
        }
        self.order[start..end].iter().map(|&i| &self.records[i]).collect()
    }

    /// Load batch `index` of the current epoch
    pub fn load_batch(&mut self, index: usize) -> Result<FeedBatch> {
        if index >= self.num_batches() {
            return Err(FlowerError::InvalidArgument(format!(
                "Batch {} out of range ({} batches per epoch)",
                index,
                self.num_batches()
            )));
        }

        let start = index * self.config.batch_size;
        let end = (start + self.config.batch_size).min(self.order.len());
        let indices: Vec<usize> = self.order[start..end].to_vec();

        let (width, height) = self.config.target_size;
        let pixels = 3 * width as usize * height as usize;
        let label_width = match self.config.class_mode {
            ClassMode::Categorical => self.num_classes,
            ClassMode::Sparse => 1,
        };

        let mut images = Vec::with_capacity(indices.len() * pixels);
        let mut labels = vec![0.0f32; indices.len() * label_width];
        let mut filenames = Vec::with_capacity(indices.len());

        for (row, &i) in indices.iter().enumerate() {
            let record = &self.records[i];
            let img = self.load_image(record)?;
            let img = self.augmenter.augment(&img, &mut self.rng);
            images.extend(to_chw(&img, self.config.rescale));

            match self.config.class_mode {
                ClassMode::Categorical => labels[row * label_width + record.label] = 1.0,
                ClassMode::Sparse => labels[row] = record.label as f32,
            }
            filenames.push(record.filename.clone());
        }

        Ok(FeedBatch {
            images,
            labels,
            filenames,
            image_shape: (3, height as usize, width as usize),
        })
    }

    /// Next batch, moving to a new epoch after the last one
    pub fn next_batch(&mut self) -> Result<FeedBatch> {
        if self.is_empty() {
            return Err(FlowerError::Dataset("Feed has no records".to_string()));
        }

        let batch = self.load_batch(self.position)?;
        self.position += 1;
        if self.position >= self.num_batches() {
            self.on_epoch_end();
        }
        Ok(batch)
    }

    /// Start a new epoch, reshuffling when enabled
    pub fn on_epoch_end(&mut self) {
        self.position = 0;
        self.epoch += 1;
        if self.shuffle {
            self.order.shuffle(&mut self.rng);
        }
        debug!("Feed epoch {} started", self.epoch);
    }

    /// Rewind to the first batch of the current epoch
    pub fn reset(&mut self) {
        self.position = 0;
    }

    fn load_image(&self, record: &LabeledRecord) -> Result<RgbImage> {
        let path = self.directory.join(&record.filename);
        if !path.exists() {
            return Err(FlowerError::PathNotFound(path));
        }

        let (width, height) = self.config.target_size;
        // Content decides the format, not the extension
        let img = ImageReader::open(&path)?
            .with_guessed_format()?
            .decode()?
            .resize_exact(width, height, FilterType::Nearest)
            .to_rgb8();
        Ok(img)
    }
}

/// Convert to CHW layout, multiplying every channel value by `rescale`
fn to_chw(img: &RgbImage, rescale: f32) -> Vec<f32> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let plane = width * height;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in img.enumerate_pixels() {
        let i = y as usize * width + x as usize;
        data[i] = pixel[0] as f32 * rescale;
        data[plane + i] = pixel[1] as f32 * rescale;
        data[2 * plane + i] = pixel[2] as f32 * rescale;
    }

    data
}

/// Train, test and validation feeds built from one split
pub struct FeedSet {
    pub train: ImageFeed,
    pub test: ImageFeed,
    pub validation: ImageFeed,
}

impl FeedSet {
    /// Build the three feeds; the validation feed keeps record order
    pub fn from_splits(
        splits: &DatasetSplits,
        directory: impl AsRef<Path>,
        config: &FeedConfig,
    ) -> Result<Self> {
        let directory = directory.as_ref();
        let build = |partition: Partition, offset: u64, shuffle: bool| {
            let mut feed_config = config.clone();
            feed_config.seed = config.seed.map(|s| s.wrapping_add(offset));
            ImageFeed::new(
                splits.partition(partition).to_vec(),
                directory,
                splits.num_classes(),
                feed_config,
                shuffle,
            )
        };

        let feeds = Self {
            train: build(Partition::Train, 0, true)?,
            test: build(Partition::Test, 1, true)?,
            validation: build(Partition::Validation, 2, false)?,
        };

        info!(
            "Built feeds from {:?}: {} train, {} test, {} validation batches",
            directory,
            feeds.train.num_batches(),
            feeds.test.num_batches(),
            feeds.validation.num_batches()
        );

        Ok(feeds)
    }

    pub fn get_mut(&mut self, partition: Partition) -> &mut ImageFeed {
        match partition {
            Partition::Train => &mut self.train,
            Partition::Test => &mut self.test,
            Partition::Validation => &mut self.validation,
        }
    }
}
