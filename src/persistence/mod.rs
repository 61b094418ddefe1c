//! On-disk persistence for trained models and training histories

pub mod history;
pub mod model_store;

pub use history::{HistoryStore, TrainingHistory};
pub use model_store::{ModelStore, StoredModel};

use crate::utils::error::{FlowerError, Result};

/// Names must be a single plain path component
pub(crate) fn check_name(kind: &str, name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(FlowerError::InvalidArgument(format!("{} name is required", kind)));
    }
    if trimmed != name || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(FlowerError::InvalidArgument(format!(
            "{} name '{}' must be a plain file name",
            kind, name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_name() {
        assert!(check_name("Model", "baseline").is_ok());
        assert!(check_name("History", "run1.bin").is_ok());

        for name in ["", "  ", ".", "..", "../x", "a/b", "a\\b", " padded"] {
            assert!(
                matches!(check_name("History", name), Err(FlowerError::InvalidArgument(_))),
                "{:?}",
                name
            );
        }
    }
}
