//! Training history records and their binary storage.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::persistence::check_name;
use crate::utils::error::{FlowerError, Result};

/// Per-epoch metric values keyed by metric name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    metrics: BTreeMap<String, Vec<f64>>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one epoch's value for `metric`
    pub fn record(&mut self, metric: &str, value: f64) {
        self.metrics.entry(metric.to_string()).or_default().push(value);
    }

    pub fn get(&self, metric: &str) -> Option<&[f64]> {
        self.metrics.get(metric).map(Vec::as_slice)
    }

    pub fn metric_names(&self) -> Vec<&str> {
        self.metrics.keys().map(String::as_str).collect()
    }

    /// Longest recorded series
    pub fn epochs(&self) -> usize {
        self.metrics.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn last(&self, metric: &str) -> Option<f64> {
        self.get(metric).and_then(|v| v.last().copied())
    }

    /// Best value and its epoch (0-based)
    pub fn best(&self, metric: &str, higher_is_better: bool) -> Option<(usize, f64)> {
        let values = self.get(metric)?;
        values
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .reduce(|best, current| {
                let better = if higher_is_better {
                    current.1 > best.1
                } else {
                    current.1 < best.1
                };
                if better {
                    current
                } else {
                    best
                }
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl FromIterator<(String, Vec<f64>)> for TrainingHistory {
    fn from_iter<I: IntoIterator<Item = (String, Vec<f64>)>>(iter: I) -> Self {
        Self {
            metrics: iter.into_iter().collect(),
        }
    }
}

/// Directory of bincode-encoded histories
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `history` to `<dir>/<filename>`, replacing any existing file
    pub fn save(&self, history: &TrainingHistory, filename: &str) -> Result<PathBuf> {
        check_name("History", filename)?;

        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        if path.exists() {
            warn!("Replacing existing history file {:?}", path);
        }

        write_history(history, File::create(&path)?)?;

        info!(
            "Saved history ({} metrics, {} epochs) to {:?}",
            history.metrics.len(),
            history.epochs(),
            path
        );
        Ok(path)
    }

    /// Read `<dir>/<filename>`
    pub fn load(&self, filename: &str) -> Result<TrainingHistory> {
        check_name("History", filename)?;
        Self::load_path(self.dir.join(filename))
    }

    /// Read a history file from any location
    pub fn load_path(path: impl AsRef<Path>) -> Result<TrainingHistory> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(FlowerError::PathNotFound(path.to_path_buf()));
        }

        let reader = BufReader::new(File::open(path)?);
        let history: TrainingHistory = bincode::deserialize_from(reader)?;
        info!("Loaded history from {:?}", path);
        Ok(history)
    }
}

/// Encode `history` into `writer`, surfacing buffered write errors
fn write_history<W: Write>(history: &TrainingHistory, writer: W) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    bincode::serialize_into(&mut writer, history)?;
    writer.flush()?;
    Ok(())
}
