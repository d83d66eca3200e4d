//! Checkpoint files for resumable fetch runs
//!
//! After every batch the runner hands a [`ProgressSnapshot`] to a sink; the
//! [`CheckpointManager`] sink writes it as `<name>.checkpoint.json`. A later
//! run started with `--resume` loads the snapshot and skips years that already
//! succeeded.
//!
//! # Example
//!
//! ```no_run
//! use cosmic_birthday::crawler::batch::{ProgressSnapshot, YearLedger};
//! use cosmic_birthday::models::PhaseRecord;
//! use cosmic_birthday::storage::checkpoint::CheckpointManager;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let manager = CheckpointManager::new(Path::new("./data/checkpoints"))?;
//!
//! if let Some(snapshot) = manager.load::<ProgressSnapshot<PhaseRecord>>("moon-phases")? {
//!     println!("{} years already fetched", snapshot.ledger.succeeded());
//! }
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::crawler::batch::{ProgressSink, ProgressSnapshot, YearLedger};
use crate::utils::write_json_atomic;

const EXTENSION: &str = ".checkpoint.json";

/// Manages checkpoint files in one directory
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    /// Directory for checkpoint files
    checkpoint_dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new checkpoint manager
    pub fn new(checkpoint_dir: &Path) -> Result<Self> {
        fs::create_dir_all(checkpoint_dir).context("Failed to create checkpoint directory")?;

        Ok(Self {
            checkpoint_dir: checkpoint_dir.to_path_buf(),
        })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.checkpoint_dir.join(format!("{name}{EXTENSION}"))
    }

    /// Save checkpoint state
    pub fn save<T: Serialize>(&self, name: &str, state: &T) -> Result<PathBuf> {
        let filepath = self.path_for(name);

        write_json_atomic(&filepath, state)
            .with_context(|| format!("Failed to write checkpoint file: {}", filepath.display()))?;

        tracing::debug!(path = %filepath.display(), "Checkpoint saved");
        Ok(filepath)
    }

    /// Load checkpoint state
    pub fn load<T: for<'de> Deserialize<'de>>(&self, name: &str) -> Result<Option<T>> {
        let filepath = self.path_for(name);

        if !filepath.exists() {
            return Ok(None);
        }

        let file = File::open(&filepath)
            .with_context(|| format!("Failed to open checkpoint file: {}", filepath.display()))?;

        let reader = BufReader::new(file);
        let state = serde_json::from_reader(reader).context("Failed to deserialize checkpoint")?;

        tracing::debug!(path = %filepath.display(), "Checkpoint loaded");
        Ok(Some(state))
    }

    /// Ledger from the named checkpoint, or an empty one
    ///
    /// A checkpoint that cannot be read is logged and ignored.
    pub fn load_ledger<T>(&self, name: &str) -> YearLedger<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        match self.load::<ProgressSnapshot<T>>(name) {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    checkpoint = name,
                    succeeded = snapshot.ledger.succeeded(),
                    failed = snapshot.ledger.failed(),
                    "Resuming from checkpoint"
                );
                snapshot.ledger
            }
            Ok(None) => YearLedger::new(),
            Err(err) => {
                tracing::warn!(checkpoint = name, error = %err, "Ignoring unreadable checkpoint");
                YearLedger::new()
            }
        }
    }

    /// Check if checkpoint exists
    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).exists()
    }

    /// Delete checkpoint
    pub fn delete(&self, name: &str) -> Result<()> {
        let filepath = self.path_for(name);

        if filepath.exists() {
            fs::remove_file(&filepath)
                .with_context(|| format!("Failed to delete checkpoint: {}", filepath.display()))?;
            tracing::debug!(path = %filepath.display(), "Checkpoint deleted");
        }

        Ok(())
    }

    /// List all checkpoints
    pub fn list(&self) -> Result<Vec<String>> {
        let mut checkpoints = Vec::new();

        for entry in fs::read_dir(&self.checkpoint_dir)? {
            let entry = entry?;
            let path = entry.path();

            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if let Some(session) = name.strip_suffix(EXTENSION) {
                    checkpoints.push(session.to_string());
                }
            }
        }

        checkpoints.sort();
        Ok(checkpoints)
    }

    /// Get checkpoint directory
    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }
}

impl<T: Serialize> ProgressSink<T> for CheckpointManager {
    fn save(&self, snapshot: &ProgressSnapshot<T>) -> crate::error::Result<()> {
        CheckpointManager::save(self, &snapshot.name, snapshot)?;
        Ok(())
    }
}
