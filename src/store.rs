//! Persists [`CoordinatorState`] snapshots between runs.
//!
//! Snapshots are written after an outcome or a page change, never at the
//! start of an application, so a crash mid-application leaves the item out
//! of `processed_ids` and it is retried next time.

use std::fs;
use std::path::{Path, PathBuf};

use crate::coordinator::CoordinatorState;
use crate::error::AutoApplyError;

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

    /// Returns `None` when no snapshot has been written yet.
    pub fn load(&self) -> Result<Option<CoordinatorState>, AutoApplyError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        let state = serde_json::from_str::<CoordinatorState>(&contents)?;
        Ok(Some(state))
    }

    /// Writes through a temporary file so a partial write never replaces a
    /// good snapshot.
    pub fn save(&self, state: &CoordinatorState) -> Result<(), AutoApplyError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Deletes the snapshot. Returns `false` if there was none.
    pub fn clear(&self) -> Result<bool, AutoApplyError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_creates_parent_dirs_and_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested/deeper/state.json"));

        let mut state = CoordinatorState {
            current_page: 3,
            ..Default::default()
        };
        state.processed_ids.insert("job-1".into());
        store.save(&state).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, state);
        assert!(!dir.path().join("nested/deeper/state.json.tmp").exists());
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        store.save(&CoordinatorState::default()).unwrap();
        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        let err = StateStore::new(path).load().unwrap_err();
        assert!(matches!(err, AutoApplyError::Json(_)));
    }
}
