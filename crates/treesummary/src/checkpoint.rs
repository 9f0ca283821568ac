//! Persisted processing state that makes re-runs resumable.
//!
//! The state is scoped to exactly one root directory: loading it for a
//! different root discards the processed set before anything uses it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::CheckpointError;

/// Fixed file name of the checkpoint inside the output directory.
pub const CHECKPOINT_FILE_NAME: &str = "treesummary_state.json";

/// Current on-disk format version.
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingState {
    pub version: u32,
    /// Root the processed set belongs to; empty when nothing has run yet.
    #[serde(default)]
    pub last_directory: String,
    #[serde(default)]
    pub processed_files: BTreeSet<String>,
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self {
            version: CHECKPOINT_FORMAT_VERSION,
            last_directory: String::new(),
            processed_files: BTreeSet::new(),
        }
    }
}

impl ProcessingState {
    pub fn is_processed(&self, path: &Path) -> bool {
        self.processed_files
            .contains(path.to_string_lossy().as_ref())
    }

    /// Records a path; returns false if it was already present.
    pub fn mark_processed(&mut self, path: &Path) -> bool {
        self.processed_files
            .insert(path.to_string_lossy().into_owned())
    }

    pub fn processed_count(&self) -> usize {
        self.processed_files.len()
    }
}

/// Single-writer store for [`ProcessingState`].
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store at the fixed file name inside `output_directory`.
    pub fn in_directory<P: AsRef<Path>>(output_directory: P) -> Self {
        Self::new(output_directory.as_ref().join(CHECKPOINT_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the persisted state, or an empty state if nothing was saved.
    pub fn load(&self) -> Result<ProcessingState, CheckpointError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No checkpoint at {}", self.path.display());
                return Ok(ProcessingState::default());
            }
            Err(e) => {
                return Err(CheckpointError::Read {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let state: ProcessingState =
            serde_json::from_slice(&bytes).map_err(|e| CheckpointError::Decode {
                path: self.path.clone(),
                source: e,
            })?;

        if state.version != CHECKPOINT_FORMAT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: state.version,
                expected: CHECKPOINT_FORMAT_VERSION,
            });
        }

        Ok(state)
    }

    /// Loads the state for `root`. A checkpoint recorded for another root is
    /// reset (and persisted) before being returned.
    /// An undecodable checkpoint is treated like a missing one.
    pub fn load_for_root(&self, root: &Path) -> Result<ProcessingState, CheckpointError> {
        let mut state = match self.load() {
            Ok(state) => state,
            Err(e @ (CheckpointError::Decode { .. } | CheckpointError::UnsupportedVersion { .. })) => {
                warn!("Ignoring unusable checkpoint: {}", e);
                ProcessingState::default()
            }
            Err(e) => return Err(e),
        };
        let root = root.to_string_lossy();

        if state.last_directory != root {
            if !state.last_directory.is_empty() {
                warn!(
                    "Checkpoint belongs to '{}', discarding {} processed entries for '{}'",
                    state.last_directory,
                    state.processed_count(),
                    root
                );
            }
            self.reset(&mut state, &root)?;
        } else {
            info!(
                "Resuming from checkpoint: {} files already processed",
                state.processed_count()
            );
        }

        Ok(state)
    }

    /// Overwrites the whole state. Writes a sibling temp file and renames it
    /// over the target so a crash never leaves a truncated checkpoint.
    pub fn save(&self, state: &ProcessingState) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| CheckpointError::Write {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let bytes = serde_json::to_vec_pretty(state).map_err(CheckpointError::Encode)?;
        let tmp = self.path.with_extension("json.tmp");

        std::fs::write(&tmp, bytes).map_err(|e| CheckpointError::Write {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| CheckpointError::Write {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }

    /// Clears the processed set, records `directory` as the owning root and persists.
    pub fn reset(&self, state: &mut ProcessingState, directory: &str) -> Result<(), CheckpointError> {
        state.processed_files.clear();
        state.last_directory = directory.to_string();
        state.version = CHECKPOINT_FORMAT_VERSION;
        self.save(state)
    }

    /// Deletes the checkpoint file. Missing files are fine.
    pub fn clear(&self) -> Result<(), CheckpointError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Checkpoint cleared: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CheckpointError::Remove {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_returns_empty_state() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::in_directory(temp_dir.path());

        let state = store.load().unwrap();
        assert_eq!(state, ProcessingState::default());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::in_directory(temp_dir.path().join("nested"));

        let mut state = ProcessingState {
            last_directory: "/proj".to_string(),
            ..Default::default()
        };
        state.mark_processed(Path::new("/proj/a.py"));
        state.mark_processed(Path::new("/proj/dir with space/b#.py"));
        store.save(&state).unwrap();

        assert_eq!(store.load().unwrap(), state);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_load_for_same_root_keeps_processed() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::in_directory(temp_dir.path());

        let mut state = ProcessingState {
            last_directory: "/proj".to_string(),
            ..Default::default()
        };
        state.mark_processed(Path::new("/proj/a.py"));
        store.save(&state).unwrap();

        let loaded = store.load_for_root(Path::new("/proj")).unwrap();
        assert!(loaded.is_processed(Path::new("/proj/a.py")));
        assert!(!loaded.is_processed(Path::new("/proj/b.py")));
    }

    #[test]
    fn test_load_for_other_root_discards_processed() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::in_directory(temp_dir.path());

        let mut state = ProcessingState {
            last_directory: "/old".to_string(),
            ..Default::default()
        };
        state.mark_processed(Path::new("/old/a.py"));
        store.save(&state).unwrap();

        let loaded = store.load_for_root(Path::new("/new")).unwrap();
        assert_eq!(loaded.processed_count(), 0);
        assert_eq!(loaded.last_directory, "/new");

        // The reset is persisted, not just applied in memory.
        assert_eq!(store.load().unwrap().last_directory, "/new");
    }

    #[test]
    fn test_mark_processed_is_idempotent() {
        let mut state = ProcessingState::default();
        assert!(state.mark_processed(Path::new("/p/a.rs")));
        assert!(!state.mark_processed(Path::new("/p/a.rs")));
        assert_eq!(state.processed_count(), 1);
    }

    #[test]
    fn test_corrupt_checkpoint_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::in_directory(temp_dir.path());
        std::fs::write(store.path(), b"{ truncated").unwrap();

        assert!(matches!(store.load(), Err(CheckpointError::Decode { .. })));
    }

    #[test]
    fn test_load_for_root_starts_fresh_on_corrupt_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::in_directory(temp_dir.path());
        std::fs::write(store.path(), b"not json at all").unwrap();

        let state = store.load_for_root(Path::new("/proj")).unwrap();
        assert_eq!(state.processed_count(), 0);
        assert_eq!(store.load().unwrap().last_directory, "/proj");
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::in_directory(temp_dir.path());
        std::fs::write(
            store.path(),
            br#"{"version": 99, "last_directory": "", "processed_files": []}"#,
        )
        .unwrap();

        assert!(matches!(
            store.load(),
            Err(CheckpointError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_clear_removes_file_and_tolerates_missing() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::in_directory(temp_dir.path());
        store.save(&ProcessingState::default()).unwrap();
        assert!(store.path().exists());

        store.clear().unwrap();
        assert!(!store.path().exists());
        store.clear().unwrap();
    }
}
