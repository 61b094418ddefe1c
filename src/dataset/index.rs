//! Index file reading
//!
//! The index file lists one image filename per line; a line's position
//! decides its class. It is read fresh on every partition request.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::utils::error::{FlowerError, Result};

/// Lines of an index file, trimmed, in file order
#[derive(Debug, Clone)]
pub struct IndexFile {
    pub path: PathBuf,
    pub lines: Vec<String>,
}

impl IndexFile {
    /// Read an index file from disk
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(FlowerError::PathNotFound(path));
        }

        let content = std::fs::read_to_string(&path)?;
        let lines = parse_lines(&content);
        debug!("Read {} index lines from {:?}", lines.len(), path);

        Ok(Self { path, lines })
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Split index content into trimmed lines, keeping positions intact
pub fn parse_lines(content: &str) -> Vec<String> {
    content.lines().map(|l| l.trim().to_string()).collect()
}
