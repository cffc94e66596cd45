//! Persisted run position

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use ivrl_core::{IvrlError, Result};

const CHECKPOINT_FILE: &str = "env_checkpoint.json";

/// Where a run stopped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub step: u64,
    /// Position in the training split
    pub iter: u64,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(step: u64, iter: u64) -> Self {
        Self {
            step,
            iter,
            saved_at: Utc::now(),
        }
    }

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(CHECKPOINT_FILE)
    }

    /// Write to `dir`, creating it when missing
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|e| {
            IvrlError::Checkpoint(format!("Failed to create {}: {e}", dir.display()))
        })?;

        let path = Self::path(dir);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .map_err(|e| IvrlError::Checkpoint(format!("Failed to write {}: {e}", path.display())))?;

        debug!("Saved checkpoint step={} iter={} to {}", self.step, self.iter, path.display());
        Ok(path)
    }

    /// Read the checkpoint in `dir`, `None` if there is none
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(dir);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| IvrlError::Checkpoint(format!("Failed to read {}: {e}", path.display())))?;
        let checkpoint = serde_json::from_str(&content)
            .map_err(|e| IvrlError::Checkpoint(format!("Invalid {}: {e}", path.display())))?;
        Ok(Some(checkpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Checkpoint::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        let checkpoint = Checkpoint::new(40, 41);

        let path = checkpoint.save(&nested).unwrap();
        assert!(path.ends_with(CHECKPOINT_FILE));

        let loaded = Checkpoint::load(&nested).unwrap().unwrap();
        assert_eq!(loaded, checkpoint);
    }

    #[test]
    fn test_corrupt_checkpoint_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(Checkpoint::path(dir.path()), "{not json").unwrap();
        assert!(matches!(
            Checkpoint::load(dir.path()),
            Err(IvrlError::Checkpoint(_))
        ));
    }
}
