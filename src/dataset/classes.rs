//! Class tables and filename classification
//!
//! The index file groups images in fixed-size positional blocks, one block per
//! flower category. A [`ClassTable`] names the categories used by an
//! experiment and records where each one starts in the index file, so
//! classification never depends on the numeric value of an enum variant.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::error::{FlowerError, Result};

/// Images per category in the Oxford 17 flowers index
pub const IMAGES_PER_FLOWER_TYPE: usize = 80;

/// Category names of the Oxford 17 flowers dataset, in index-file order
pub const OXFORD17_CLASS_NAMES: [&str; 17] = [
    "Daffodil",
    "Snowdrop",
    "LilyValley",
    "Bluebell",
    "Crocus",
    "Iris",
    "Tigerlily",
    "Tulip",
    "Fritillary",
    "Sunflower",
    "Daisy",
    "ColtsFoot",
    "Dandelion",
    "Cowslip",
    "Buttercup",
    "Windflower",
    "Pansy",
];

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

/// The flower categories used by the default three-class experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowerType {
    Daffodil,
    Sunflower,
    Dandelion,
}

impl FlowerType {
    pub const ALL: [FlowerType; 3] = [
        FlowerType::Daffodil,
        FlowerType::Sunflower,
        FlowerType::Dandelion,
    ];

    /// Block number of this category in the 17-category index ordering
    pub fn block(self) -> usize {
        match self {
            FlowerType::Daffodil => 0,
            FlowerType::Sunflower => 9,
            FlowerType::Dandelion => 12,
        }
    }

    pub fn name(self) -> &'static str {
        OXFORD17_CLASS_NAMES[self.block()]
    }
}

impl std::fmt::Display for FlowerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One class of an experiment and the first index-file line it owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSpec {
    /// Label written into partitions (e.g. "Sunflower")
    pub name: String,
    /// 0-based index-file line where this class's block begins
    pub first_index: usize,
}

impl ClassSpec {
    pub fn new(name: impl Into<String>, first_index: usize) -> Self {
        Self {
            name: name.into(),
            first_index,
        }
    }

    /// Whether `index` falls inside this class's block
    pub fn contains(&self, index: usize, images_per_class: usize) -> bool {
        index >= self.first_index && index - self.first_index < images_per_class
    }
}

/// Ordered set of classes sharing a fixed block length
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassTable {
    /// Number of consecutive index lines per class
    pub images_per_class: usize,
    /// Classes in label order; a class's position is its label
    pub classes: Vec<ClassSpec>,
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::from_flower_types(&FlowerType::ALL, IMAGES_PER_FLOWER_TYPE)
    }
}

impl ClassTable {
    /// Create a table and check that it is usable
    pub fn new(images_per_class: usize, classes: Vec<ClassSpec>) -> Result<Self> {
        let table = Self {
            images_per_class,
            classes,
        };
        table.validate()?;
        Ok(table)
    }

    /// Table whose classes start at `block * images_per_class`
    pub fn from_blocks(images_per_class: usize, blocks: &[(&str, usize)]) -> Self {
        Self {
            images_per_class,
            classes: blocks
                .iter()
                .map(|(name, block)| ClassSpec::new(*name, block * images_per_class))
                .collect(),
        }
    }

    pub fn from_flower_types(types: &[FlowerType], images_per_class: usize) -> Self {
        let blocks: Vec<(&str, usize)> = types.iter().map(|t| (t.name(), t.block())).collect();
        Self::from_blocks(images_per_class, &blocks)
    }

    /// All seventeen categories of the Oxford flowers index
    pub fn oxford17() -> Self {
        let blocks: Vec<(&str, usize)> = OXFORD17_CLASS_NAMES
            .iter()
            .enumerate()
            .map(|(block, name)| (*name, block))
            .collect();
        Self::from_blocks(IMAGES_PER_FLOWER_TYPE, &blocks)
    }

    /// Reject empty tables, zero-length blocks, duplicate names and overlaps
    pub fn validate(&self) -> Result<()> {
        if self.images_per_class == 0 {
            return Err(FlowerError::Config(
                "images_per_class must be greater than 0".to_string(),
            ));
        }
        if self.classes.is_empty() {
            return Err(FlowerError::Config(
                "Class table must contain at least one class".to_string(),
            ));
        }

        for (i, a) in self.classes.iter().enumerate() {
            if a.name.trim().is_empty() {
                return Err(FlowerError::Config(format!("Class {} has an empty name", i)));
            }
            for b in &self.classes[i + 1..] {
                if a.name == b.name {
                    return Err(FlowerError::Config(format!(
                        "Duplicate class name '{}'",
                        a.name
                    )));
                }
                if a.first_index.abs_diff(b.first_index) < self.images_per_class {
                    return Err(FlowerError::Config(format!(
                        "Classes '{}' and '{}' have overlapping index ranges",
                        a.name, b.name
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn class_names(&self) -> Vec<String> {
        self.classes.iter().map(|c| c.name.clone()).collect()
    }

    /// Label (position in the table) of the class with the given name
    pub fn label_of(&self, name: &str) -> Option<usize> {
        self.classes.iter().position(|c| c.name == name)
    }

    /// Class owning the given 0-based index position
    pub fn classify(&self, index: usize) -> Result<&ClassSpec> {
        classify(index, self.images_per_class, &self.classes)
    }

    /// Class owning the image named `filename`
    pub fn classify_filename(&self, filename: &str) -> Result<&ClassSpec> {
        self.classify(parse_image_index(filename)?)
    }
}

/// Extract the 0-based image index from a filename such as `image_0721.jpg`
///
/// The first run of digits is the 1-based image number.
pub fn parse_image_index(filename: &str) -> Result<usize> {
    let digits = DIGITS.find(filename).ok_or_else(|| {
        FlowerError::InvalidIndex(format!("Invalid filename '{}': no number found", filename))
    })?;

    let number: usize = digits.as_str().parse().map_err(|_| {
        FlowerError::InvalidIndex(format!(
            "Invalid filename '{}': number out of range",
            filename
        ))
    })?;

    number.checked_sub(1).ok_or_else(|| {
        FlowerError::InvalidIndex(format!(
            "Invalid filename '{}': image numbers start at 1",
            filename
        ))
    })
}

/// Map a 0-based index position to the class whose block contains it
pub fn classify(
    filename_index: usize,
    images_per_class: usize,
    class_table: &[ClassSpec],
) -> Result<&ClassSpec> {
    class_table
        .iter()
        .find(|c| c.contains(filename_index, images_per_class))
        .ok_or_else(|| {
            FlowerError::InvalidIndex(format!(
                "Index {} does not belong to any known class",
                filename_index
            ))
        })
}
