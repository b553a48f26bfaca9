//! JSON snapshot storage for a single [`BudgetState`].
//!
//! The engine itself is storage-agnostic; this is a small helper for hosts
//! (the CLI among them) that keep the state in a file. Saves write a
//! temporary sibling file and rename it over the target, so a concurrent
//! reader sees either the previous snapshot or the new one.

use crate::error::Result;
use crate::model::BudgetState;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state.json".into());
        self.path.with_file_name(format!(".{name}.tmp"))
    }

    /// Load the snapshot. Returns `None` if the file doesn't exist.
    pub fn load(&self) -> Result<Option<BudgetState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&self.path)?;
        let state: BudgetState = serde_json::from_str(&json)?;
        debug!("Loaded budget state from {}", self.path.display());
        Ok(Some(state))
    }

    /// Load the snapshot, or a fresh default state if none exists yet.
    pub fn load_or_default(&self) -> Result<BudgetState> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// Write the snapshot atomically (temp file + rename).
    pub fn save(&self, state: &BudgetState) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.tmp_path();
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("Saved budget state to {}", self.path.display());
        Ok(())
    }

    /// Delete the snapshot file if present.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
