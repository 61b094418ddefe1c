//! Named model artifacts on disk.
//!
//! Every model is written as a JSON envelope (`<name>.json`) holding the
//! name, a save timestamp and the serialized model itself. Saving refuses to
//! replace an existing artifact unless overwriting is requested.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::persistence::check_name;
use crate::utils::error::{FlowerError, Result};

const ARTIFACT_EXTENSION: &str = "json";

/// Envelope written for every stored model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredModel<M> {
    pub name: String,
    /// RFC 3339 timestamp
    pub saved_at: String,
    pub model: M,
}

/// Directory of named model artifacts
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact for `name`
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        check_name("Model", name)?;
        Ok(self.dir.join(format!("{}.{}", name, ARTIFACT_EXTENSION)))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Save `model` under `name`
    pub fn save<M: Serialize>(&self, model: &M, name: &str, overwrite: bool) -> Result<PathBuf> {
        let path = self.path_for(name)?;

        if path.exists() {
            if !overwrite {
                return Err(FlowerError::AlreadyExists(format!(
                    "Model '{}' already exists in {:?}",
                    name, self.dir
                )));
            }
            warn!("Overwriting model '{}'", name);
        }

        fs::create_dir_all(&self.dir)?;

        let stored = StoredModel {
            name: name.to_string(),
            saved_at: Utc::now().to_rfc3339(),
            model,
        };
        let json = serde_json::to_string_pretty(&stored)?;
        fs::write(&path, json)?;

        info!("Model '{}' saved to {:?}", name, path);
        Ok(path)
    }

    /// Load the model stored under `name`
    pub fn load<M: DeserializeOwned>(&self, name: &str) -> Result<M> {
        Ok(self.load_stored(name)?.model)
    }

    /// Load the full envelope, including its timestamp
    pub fn load_stored<M: DeserializeOwned>(&self, name: &str) -> Result<StoredModel<M>> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(FlowerError::NotFound(format!(
                "No model named '{}' in {:?}",
                name, self.dir
            )));
        }

        let json = fs::read_to_string(&path)?;
        let stored: StoredModel<M> = serde_json::from_str(&json)?;

        info!("Model '{}' loaded from {:?}", name, path);
        Ok(stored)
    }

    /// Names of all stored models, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TinyModel {
        weights: Vec<f32>,
        classes: Vec<String>,
    }

    fn tiny() -> TinyModel {
        TinyModel {
            weights: vec![0.5, -1.25, 3.0],
            classes: vec!["Daffodil".to_string(), "Sunflower".to_string()],
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().join("saved_models"));

        let path = store.save(&tiny(), "baseline", false).unwrap();
        assert!(path.ends_with("baseline.json"));
        assert!(store.exists("baseline"));

        let loaded: TinyModel = store.load("baseline").unwrap();
        assert_eq!(loaded, tiny());

        let stored: StoredModel<TinyModel> = store.load_stored("baseline").unwrap();
        assert_eq!(stored.name, "baseline");
        assert!(!stored.saved_at.is_empty());
    }

    #[test]
    fn test_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());

        store.save(&tiny(), "baseline", false).unwrap();
        let result = store.save(&tiny(), "baseline", false);
        assert!(matches!(result, Err(FlowerError::AlreadyExists(_))));

        let mut changed = tiny();
        changed.weights.push(9.0);
        store.save(&changed, "baseline", true).unwrap();
        let loaded: TinyModel = store.load("baseline").unwrap();
        assert_eq!(loaded.weights.len(), 4);
    }

    #[test]
    fn test_missing_model() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        let result = store.load::<TinyModel>("nothing");
        assert!(matches!(result, Err(FlowerError::NotFound(_))));
    }

    #[test]
    fn test_invalid_names() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());

        for name in ["", "   ", "..", "nested/model", "..\\up", " padded"] {
            let result = store.save(&tiny(), name, true);
            assert!(matches!(result, Err(FlowerError::InvalidArgument(_))), "{:?}", name);
        }
        assert!(matches!(
            store.load::<TinyModel>(""),
            Err(FlowerError::InvalidArgument(_))
        ));
        assert!(!store.exists(""));
    }

    #[test]
    fn test_list() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().join("models"));
        assert!(store.list().unwrap().is_empty());

        store.save(&tiny(), "second", false).unwrap();
        store.save(&tiny(), "first", false).unwrap();
        fs::write(dir.path().join("models").join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.list().unwrap(), vec!["first", "second"]);
    }
}
