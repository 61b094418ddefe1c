//! Train/test/validation partitioning of the flower index
//!
//! Each class is split independently so every partition keeps the class
//! proportions of the whole dataset:
//! 1. Gather the class's block of index lines
//! 2. Shuffle the block
//! 3. Take `floor(n * train)` records for training, `floor(n * test)` for
//!    testing, and leave the remainder for validation
//!
//! After all classes are processed each partition is shuffled once more so
//! that position carries no class information.
//!
//! Randomness is always injected. A fixed seed gives reproducible splits;
//! without one the thread-local generator is used.

use std::path::Path;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::classes::{ClassSpec, ClassTable};
use crate::dataset::index::IndexFile;
use crate::utils::error::{FlowerError, Result};

/// Tolerance for floor counts (0.1 * 80 must count as 8, not 7)
const FRACTION_EPSILON: f64 = 1e-9;

/// Configuration for dataset splitting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of each class used for training
    pub train_fraction: f64,
    /// Fraction of each class used for testing; `None` or `0` means
    /// `(1 - train_fraction) / 2`
    pub test_fraction: Option<f64>,
    /// Seed for reproducible splits
    pub seed: Option<u64>,
    /// Check every filename's number against the block it was read from
    pub verify_filenames: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.8,
            test_fraction: None,
            seed: None,
            verify_filenames: false,
        }
    }
}

impl SplitConfig {
    /// Create a validated split configuration
    pub fn new(train_fraction: f64, test_fraction: Option<f64>) -> Result<Self> {
        let config = Self {
            train_fraction,
            test_fraction,
            ..Self::default()
        };
        config.fractions()?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Resolve the effective fractions, applying the test default
    pub fn fractions(&self) -> Result<SplitFractions> {
        SplitFractions::resolve(self.train_fraction, self.test_fraction)
    }

    /// Random source for this configuration
    pub fn rng(&self) -> Box<dyn RngCore> {
        match self.seed {
            Some(seed) => Box::new(ChaCha8Rng::seed_from_u64(seed)),
            None => Box::new(rand::thread_rng()),
        }
    }
}

/// Validated train/test fractions; validation takes whatever is left
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitFractions {
    pub train: f64,
    pub test: f64,
}

impl SplitFractions {
    pub fn resolve(train: f64, test: Option<f64>) -> Result<Self> {
        check_fraction("Train", train)?;
        if let Some(test) = test {
            check_fraction("Test", test)?;
        }

        let requested_test = test.unwrap_or(0.0);
        if train + requested_test > 1.0 {
            return Err(FlowerError::InvalidProportion(format!(
                "Train and test fractions must not sum above 1 (got {} + {})",
                train, requested_test
            )));
        }

        let test = if requested_test == 0.0 {
            (1.0 - train) / 2.0
        } else {
            requested_test
        };

        Ok(Self { train, test })
    }

    pub fn validation(&self) -> f64 {
        (1.0 - self.train - self.test).max(0.0)
    }

    /// Partition sizes `(train, test, validation)` for a class of `n` records
    pub fn counts(&self, n: usize) -> (usize, usize, usize) {
        let train = floor_count(n, self.train).min(n);
        let test = floor_count(n, self.test).min(n - train);
        (train, test, n - train - test)
    }
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(FlowerError::InvalidProportion(format!(
            "{} fraction must be between 0.0 and 1.0 (got {})",
            name, value
        )));
    }
    Ok(())
}

fn floor_count(n: usize, fraction: f64) -> usize {
    (n as f64 * fraction + FRACTION_EPSILON).floor() as usize
}

/// One of the three output partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Train,
    Test,
    Validation,
}

impl Partition {
    pub const ALL: [Partition; 3] = [Partition::Train, Partition::Test, Partition::Validation];
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Partition::Train => write!(f, "train"),
            Partition::Test => write!(f, "test"),
            Partition::Validation => write!(f, "validation"),
        }
    }
}

impl std::str::FromStr for Partition {
    type Err = FlowerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "train" => Ok(Partition::Train),
            "test" => Ok(Partition::Test),
            "validation" | "val" => Ok(Partition::Validation),
            other => Err(FlowerError::InvalidArgument(format!(
                "Unknown partition '{}' (expected train, test or validation)",
                other
            ))),
        }
    }
}

/// A filename with its class
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabeledRecord {
    /// Filename as listed in the index file
    pub filename: String,
    /// Class name (e.g. "Sunflower")
    pub class_name: String,
    /// Position of the class in the class table
    pub label: usize,
}

/// Train, test and validation partitions of one index file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSplits {
    pub train_set: Vec<LabeledRecord>,
    pub test_set: Vec<LabeledRecord>,
    pub validation_set: Vec<LabeledRecord>,
    /// Class names in label order
    pub class_names: Vec<String>,
    /// Fractions that produced these partitions
    pub fractions: SplitFractions,
    pub total_records: usize,
}

impl DatasetSplits {
    /// Partition index lines class by class using `rng` for every shuffle
    pub fn from_lines<R: Rng + ?Sized>(
        lines: &[String],
        table: &ClassTable,
        config: &SplitConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let fractions = config.fractions()?;
        table.validate()?;

        let mut train_set = Vec::new();
        let mut test_set = Vec::new();
        let mut validation_set = Vec::new();

        for (label, class) in table.classes.iter().enumerate() {
            let mut records = gather_class(lines, table, label, class, config.verify_filenames)?;
            records.shuffle(rng);

            let (n_train, n_test, n_val) = fractions.counts(records.len());
            let mut rest = records.split_off(n_train);
            let validation = rest.split_off(n_test);

            debug!(
                "Class '{}': {} train, {} test, {} validation",
                class.name, n_train, n_test, n_val
            );

            train_set.extend(records);
            test_set.extend(rest);
            validation_set.extend(validation);
        }

        train_set.shuffle(rng);
        test_set.shuffle(rng);
        validation_set.shuffle(rng);

        let total_records = train_set.len() + test_set.len() + validation_set.len();
        info!(
            "Split {} records: {} train, {} test, {} validation",
            total_records,
            train_set.len(),
            test_set.len(),
            validation_set.len()
        );

        Ok(Self {
            train_set,
            test_set,
            validation_set,
            class_names: table.class_names(),
            fractions,
            total_records,
        })
    }

    /// Read an index file and partition it
    ///
    /// Fractions are validated before the file is touched.
    pub fn from_index_file<P: AsRef<Path>>(
        path: P,
        table: &ClassTable,
        config: &SplitConfig,
    ) -> Result<Self> {
        config.fractions()?;
        let index = IndexFile::read(path)?;
        let mut rng = config.rng();
        Self::from_lines(&index.lines, table, config, &mut *rng)
    }

    pub fn partition(&self, partition: Partition) -> &[LabeledRecord] {
        match partition {
            Partition::Train => &self.train_set,
            Partition::Test => &self.test_set,
            Partition::Validation => &self.validation_set,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn into_parts(self) -> (Vec<LabeledRecord>, Vec<LabeledRecord>, Vec<LabeledRecord>) {
        (self.train_set, self.test_set, self.validation_set)
    }

    /// Get statistics about the splits
    pub fn stats(&self) -> SplitStats {
        let per_class = self
            .class_names
            .iter()
            .enumerate()
            .map(|(label, name)| {
                let count = |records: &[LabeledRecord]| {
                    records.iter().filter(|r| r.label == label).count()
                };
                ClassCounts {
                    class_name: name.clone(),
                    train: count(&self.train_set),
                    test: count(&self.test_set),
                    validation: count(&self.validation_set),
                }
            })
            .collect();

        SplitStats {
            total_records: self.total_records,
            train_size: self.train_set.len(),
            test_size: self.test_set.len(),
            validation_size: self.validation_set.len(),
            per_class,
        }
    }

    /// Save splits to a JSON file for reproducibility
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!("Saved splits to {:?}", path);
        Ok(())
    }

    /// Load splits from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FlowerError::PathNotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

fn gather_class(
    lines: &[String],
    table: &ClassTable,
    label: usize,
    class: &ClassSpec,
    verify_filenames: bool,
) -> Result<Vec<LabeledRecord>> {
    let start = class.first_index;
    let end = start + table.images_per_class;

    if end > lines.len() {
        return Err(FlowerError::InvalidIndex(format!(
            "Class '{}' expects index lines {}..{} but the index has {} lines",
            class.name,
            start,
            end,
            lines.len()
        )));
    }

    let mut records = Vec::with_capacity(table.images_per_class);
    for (offset, filename) in lines[start..end].iter().enumerate() {
        if filename.is_empty() {
            return Err(FlowerError::InvalidIndex(format!(
                "Empty index entry at line {}",
                start + offset + 1
            )));
        }

        if verify_filenames {
            let owner = table.classify_filename(filename)?;
            if owner.name != class.name {
                return Err(FlowerError::InvalidIndex(format!(
                    "'{}' at line {} is numbered as '{}' but sits in the '{}' block",
                    filename,
                    start + offset + 1,
                    owner.name,
                    class.name
                )));
            }
        }

        records.push(LabeledRecord {
            filename: filename.clone(),
            class_name: class.name.clone(),
            label,
        });
    }

    Ok(records)
}

/// Partition a full index with the default flower classes
///
/// Returns `(train, test, validation)`.
pub fn split(
    index_lines: &[String],
    train_fraction: f64,
    test_fraction: Option<f64>,
) -> Result<(Vec<LabeledRecord>, Vec<LabeledRecord>, Vec<LabeledRecord>)> {
    let config = SplitConfig {
        train_fraction,
        test_fraction,
        ..SplitConfig::default()
    };
    let splits = DatasetSplits::from_lines(
        index_lines,
        &ClassTable::default(),
        &config,
        &mut rand::thread_rng(),
    )?;
    Ok(splits.into_parts())
}

/// Per-class partition sizes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCounts {
    pub class_name: String,
    pub train: usize,
    pub test: usize,
    pub validation: usize,
}

/// Statistics about dataset splits
#[derive(Debug, Clone)]
pub struct SplitStats {
    pub total_records: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub validation_size: usize,
    pub per_class: Vec<ClassCounts>,
}

impl std::fmt::Display for SplitStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pct = |n: usize| {
            if self.total_records == 0 {
                0.0
            } else {
                100.0 * n as f64 / self.total_records as f64
            }
        };

        writeln!(f, "Dataset Split Statistics:")?;
        writeln!(f, "  Total records: {}", self.total_records)?;
        writeln!(f, "  Number of classes: {}", self.per_class.len())?;
        writeln!(f, "  Train set: {} ({:.1}%)", self.train_size, pct(self.train_size))?;
        writeln!(f, "  Test set: {} ({:.1}%)", self.test_size, pct(self.test_size))?;
        writeln!(
            f,
            "  Validation set: {} ({:.1}%)",
            self.validation_size,
            pct(self.validation_size)
        )?;
        writeln!(f, "  Per class (train/test/validation):")?;
        for class in &self.per_class {
            writeln!(
                f,
                "    {:12} {:>4} {:>4} {:>4}",
                class.class_name, class.train, class.test, class.validation
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use tempfile::TempDir;

    fn oxford_lines() -> Vec<String> {
        (1..=1360).map(|i| format!("image_{:04}.jpg", i)).collect()
    }

    fn seeded(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    fn filenames(records: &[LabeledRecord]) -> HashSet<String> {
        records.iter().map(|r| r.filename.clone()).collect()
    }

    #[test]
    fn test_default_fractions() {
        let fractions = SplitConfig::default().fractions().unwrap();
        assert_eq!(fractions.counts(80), (64, 8, 8));
    }

    #[test]
    fn test_default_split_counts() {
        let lines = oxford_lines();
        let splits = DatasetSplits::from_lines(
            &lines,
            &ClassTable::default(),
            &SplitConfig::default(),
            &mut seeded(7),
        )
        .unwrap();

        assert_eq!(splits.train_set.len(), 192);
        assert_eq!(splits.test_set.len(), 24);
        assert_eq!(splits.validation_set.len(), 24);
        assert_eq!(splits.total_records, 240);

        for class in splits.stats().per_class {
            assert_eq!((class.train, class.test, class.validation), (64, 8, 8));
        }
    }

    #[test]
    fn test_partitions_are_disjoint_and_complete() {
        let lines = oxford_lines();
        let table = ClassTable::default();
        let config = SplitConfig::new(0.7, Some(0.2)).unwrap();
        let splits = DatasetSplits::from_lines(&lines, &table, &config, &mut seeded(1)).unwrap();

        let train = filenames(&splits.train_set);
        let test = filenames(&splits.test_set);
        let val = filenames(&splits.validation_set);

        assert!(train.is_disjoint(&test));
        assert!(train.is_disjoint(&val));
        assert!(test.is_disjoint(&val));

        let expected: HashSet<String> = table
            .classes
            .iter()
            .flat_map(|c| lines[c.first_index..c.first_index + 80].iter().cloned())
            .collect();
        let union: HashSet<String> = train.union(&test).cloned().collect();
        let union: HashSet<String> = union.union(&val).cloned().collect();
        assert_eq!(union, expected);

        assert_eq!(splits.train_set.len(), 3 * 56);
        assert_eq!(splits.test_set.len(), 3 * 16);
        assert_eq!(splits.validation_set.len(), 3 * 8);
    }

    #[test]
    fn test_records_keep_their_class() {
        let lines = oxford_lines();
        let table = ClassTable::default();
        let splits =
            DatasetSplits::from_lines(&lines, &table, &SplitConfig::default(), &mut seeded(3))
                .unwrap();

        for record in splits.train_set.iter().chain(&splits.validation_set) {
            let owner = table.classify_filename(&record.filename).unwrap();
            assert_eq!(owner.name, record.class_name);
            assert_eq!(table.label_of(&record.class_name), Some(record.label));
        }
    }

    #[test]
    fn test_everything_in_train() {
        let lines = oxford_lines();
        let config = SplitConfig::new(1.0, Some(0.0)).unwrap();
        let splits =
            DatasetSplits::from_lines(&lines, &ClassTable::default(), &config, &mut seeded(2))
                .unwrap();

        assert_eq!(splits.train_set.len(), 240);
        assert!(splits.test_set.is_empty());
        assert!(splits.validation_set.is_empty());
    }

    #[test]
    fn test_fractions_above_one_rejected() {
        let result = SplitConfig::new(0.9, Some(0.2));
        assert!(matches!(result, Err(FlowerError::InvalidProportion(_))));

        assert!(matches!(
            SplitFractions::resolve(f64::NAN, None),
            Err(FlowerError::InvalidProportion(_))
        ));
        assert!(matches!(
            SplitFractions::resolve(0.5, Some(-0.1)),
            Err(FlowerError::InvalidProportion(_))
        ));
    }

    #[test]
    fn test_sum_just_above_one_rejected() {
        assert!(matches!(
            SplitFractions::resolve(0.6, Some(0.4 + 1e-10)),
            Err(FlowerError::InvalidProportion(_))
        ));
        let exact = SplitFractions::resolve(0.7, Some(0.3)).unwrap();
        assert_eq!(exact.counts(80), (56, 24, 0));
    }

    #[test]
    fn test_uneven_class_remainder_goes_to_validation() {
        let lines: Vec<String> = (1..=14).map(|i| format!("image_{:04}.jpg", i)).collect();
        let table =
            ClassTable::new(7, vec![ClassSpec::new("A", 0), ClassSpec::new("B", 7)]).unwrap();
        let config = SplitConfig::new(0.5, Some(0.3)).unwrap();

        let splits = DatasetSplits::from_lines(&lines, &table, &config, &mut seeded(11)).unwrap();

        for class in splits.stats().per_class {
            assert_eq!((class.train, class.test, class.validation), (3, 2, 2));
        }
        assert_eq!(splits.total_records, 14);
    }

    #[test]
    fn test_counts_floor_each_fraction() {
        for n in [1usize, 7, 13, 33, 80, 99, 250] {
            for train_pct in (0..=100).step_by(5) {
                for test_pct in (1..=100 - train_pct).step_by(7) {
                    let fractions = SplitFractions::resolve(
                        train_pct as f64 / 100.0,
                        Some(test_pct as f64 / 100.0),
                    )
                    .unwrap();

                    let (train, test, validation) = fractions.counts(n);
                    let expected_train = n * train_pct / 100;
                    let expected_test = n * test_pct / 100;

                    assert_eq!(
                        (train, test, validation),
                        (expected_train, expected_test, n - expected_train - expected_test),
                        "n={} train={}% test={}%",
                        n,
                        train_pct,
                        test_pct
                    );
                    assert_eq!(train + test + validation, n);
                }
            }
        }
    }

    #[test]
    fn test_invalid_proportion_checked_before_reading() {
        let dir = TempDir::new().unwrap();
        let config = SplitConfig {
            train_fraction: 0.9,
            test_fraction: Some(0.2),
            ..SplitConfig::default()
        };

        let result = DatasetSplits::from_index_file(
            dir.path().join("does_not_exist.txt"),
            &ClassTable::default(),
            &config,
        );
        assert!(matches!(result, Err(FlowerError::InvalidProportion(_))));
    }

    #[test]
    fn test_short_index_aborts() {
        let lines: Vec<String> = oxford_lines().into_iter().take(800).collect();
        let result = DatasetSplits::from_lines(
            &lines,
            &ClassTable::default(),
            &SplitConfig::default(),
            &mut seeded(0),
        );
        assert!(matches!(result, Err(FlowerError::InvalidIndex(_))));
    }

    #[test]
    fn test_empty_entry_aborts() {
        let mut lines = oxford_lines();
        lines[5] = String::new();
        let result = DatasetSplits::from_lines(
            &lines,
            &ClassTable::default(),
            &SplitConfig::default(),
            &mut seeded(0),
        );
        assert!(matches!(result, Err(FlowerError::InvalidIndex(_))));
    }

    #[test]
    fn test_verify_filenames_detects_misplaced_entry() {
        let mut lines = oxford_lines();
        lines.swap(0, 730);
        let config = SplitConfig {
            verify_filenames: true,
            ..SplitConfig::default()
        };

        let result =
            DatasetSplits::from_lines(&lines, &ClassTable::default(), &config, &mut seeded(0));
        assert!(matches!(result, Err(FlowerError::InvalidIndex(_))));

        let relaxed = SplitConfig::default();
        assert!(
            DatasetSplits::from_lines(&lines, &ClassTable::default(), &relaxed, &mut seeded(0))
                .is_ok()
        );
    }

    #[test]
    fn test_seeded_split_is_reproducible() {
        let lines = oxford_lines();
        let table = ClassTable::default();
        let config = SplitConfig::default().with_seed(42);

        let a = DatasetSplits::from_lines(&lines, &table, &config, &mut *config.rng()).unwrap();
        let b = DatasetSplits::from_lines(&lines, &table, &config, &mut *config.rng()).unwrap();

        assert_eq!(a.train_set, b.train_set);
        assert_eq!(a.test_set, b.test_set);
        assert_eq!(a.validation_set, b.validation_set);
    }

    #[test]
    fn test_unseeded_split_keeps_counts() {
        let lines = oxford_lines();
        let (train_a, test_a, val_a) = split(&lines, 0.8, None).unwrap();
        let (train_b, test_b, val_b) = split(&lines, 0.8, None).unwrap();

        assert_eq!(train_a.len(), train_b.len());
        assert_eq!(test_a.len(), test_b.len());
        assert_eq!(val_a.len(), val_b.len());
    }

    #[test]
    fn test_final_shuffle_mixes_classes() {
        let lines = oxford_lines();
        let splits = DatasetSplits::from_lines(
            &lines,
            &ClassTable::default(),
            &SplitConfig::default(),
            &mut seeded(11),
        )
        .unwrap();

        // Without the final shuffle the first 64 training records would all be Daffodils
        let mut head: HashMap<&str, usize> = HashMap::new();
        for record in &splits.train_set[..64] {
            *head.entry(record.class_name.as_str()).or_default() += 1;
        }
        assert!(head.len() > 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("splits/split.json");
        let splits = DatasetSplits::from_lines(
            &oxford_lines(),
            &ClassTable::default(),
            &SplitConfig::default(),
            &mut seeded(5),
        )
        .unwrap();

        splits.save(&path).unwrap();
        let loaded = DatasetSplits::load(&path).unwrap();

        assert_eq!(loaded.train_set, splits.train_set);
        assert_eq!(loaded.class_names, vec!["Daffodil", "Sunflower", "Dandelion"]);
    }

    #[test]
    fn test_stats_display() {
        let splits = DatasetSplits::from_lines(
            &oxford_lines(),
            &ClassTable::default(),
            &SplitConfig::default(),
            &mut seeded(5),
        )
        .unwrap();

        let text = splits.stats().to_string();
        assert!(text.contains("Total records: 240"));
        assert!(text.contains("Sunflower"));
    }

    #[test]
    fn test_partition_from_str() {
        assert_eq!("train".parse::<Partition>().unwrap(), Partition::Train);
        assert_eq!("VAL".parse::<Partition>().unwrap(), Partition::Validation);
        assert!("holdout".parse::<Partition>().is_err());
    }
}
