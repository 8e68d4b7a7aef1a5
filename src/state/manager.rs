//! Durable storage for the current release.
//!
//! Writes go to a sibling temporary file which is synced and then renamed over the state
//! file, so a concurrent reader sees either the previous or the new document. Only one
//! process may drive a release at a time; nothing here enforces that.

use crate::error::{Result, StateError};
use crate::state::{Release, STATE_FORMAT_VERSION};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// State manager for the persisted release document
#[derive(Debug, Clone)]
pub struct StateManager {
    state_file_path: PathBuf,
}

impl StateManager {
    /// Create a state manager for `state_file_path`
    pub fn new<P: AsRef<Path>>(state_file_path: P) -> Self {
        Self {
            state_file_path: state_file_path.as_ref().to_path_buf(),
        }
    }

    /// Path of the state document
    pub fn path(&self) -> &Path {
        &self.state_file_path
    }

    /// Check if state file exists
    pub fn state_exists(&self) -> bool {
        self.state_file_path.exists()
    }

    /// Load the current release.
    ///
    /// A missing file yields an empty release in stage `done`. A file that does not parse is
    /// reported as corrupted and never replaced.
    pub fn load(&self) -> Result<Release> {
        if !self.state_exists() {
            log::debug!("No state at {}, starting empty", self.state_file_path.display());
            return Ok(Release::default());
        }

        let content = fs::read_to_string(&self.state_file_path).map_err(|e| StateError::LoadFailed {
            reason: format!("Failed to read {}: {e}", self.state_file_path.display()),
        })?;

        let release: Release = serde_json::from_str(&content).map_err(|e| StateError::Corrupted {
            path: self.state_file_path.clone(),
            reason: e.to_string(),
        })?;

        if release.format_version > STATE_FORMAT_VERSION {
            return Err(StateError::VersionMismatch {
                expected: STATE_FORMAT_VERSION,
                found: release.format_version,
            }
            .into());
        }

        Ok(release)
    }

    /// Atomically replace the stored release
    pub fn save(&self, release: &Release) -> Result<()> {
        let serialized = serde_json::to_string_pretty(release).map_err(|e| StateError::SaveFailed {
            reason: format!("Failed to serialize state: {e}"),
        })?;

        if let Some(parent) = self.state_file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to create {}: {e}", parent.display()),
            })?;
        }

        let temp_file_path = self.state_file_path.with_extension("tmp");
        {
            let mut file = fs::File::create(&temp_file_path).map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to create temp file: {e}"),
            })?;

            file.write_all(serialized.as_bytes())
                .map_err(|e| StateError::SaveFailed {
                    reason: format!("Failed to write state: {e}"),
                })?;

            file.sync_all().map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to sync file: {e}"),
            })?;
        }

        fs::rename(&temp_file_path, &self.state_file_path).map_err(|e| StateError::SaveFailed {
            reason: format!("Failed to rename temp file: {e}"),
        })?;

        log::trace!("Saved state to {}", self.state_file_path.display());
        Ok(())
    }
}
