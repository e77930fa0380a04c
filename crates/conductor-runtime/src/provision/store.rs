//! JSON-file setup-state store.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use conductor_core::{SetupState, SetupStateRepository, StoreError, setup_state_path};
use tracing::debug;

/// Stores [`SetupState`] as pretty-printed JSON.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous state intact.
#[derive(Debug, Clone)]
pub struct JsonSetupStateStore {
    path: PathBuf,
}

impl JsonSetupStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the conventional location under a data root.
    pub fn in_data_root(root: &Path) -> Self {
        Self::new(setup_state_path(root))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: &io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl SetupStateRepository for JsonSetupStateStore {
    async fn load(&self) -> Result<SetupState, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no setup state yet");
                Ok(SetupState::default())
            }
            Err(e) => Err(self.io_error(&e)),
        }
    }

    async fn save(&self, state: &SetupState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(&e))?;
        }

        let content = serde_json::to_string_pretty(state)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| self.io_error(&e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(&e))?;

        debug!(path = %self.path.display(), "setup state saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_loads_default() {
        let dir = tempdir().unwrap();
        let store = JsonSetupStateStore::in_data_root(dir.path());
        let state = store.load().await.unwrap();
        assert!(!state.setup_completed);
        assert!(state.environment_path.is_none());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempdir().unwrap();
        let store = JsonSetupStateStore::new(dir.path().join("nested").join("state.json"));
        let state = SetupState::completed("/data/venv");

        store.save(&state).await.unwrap();
        assert_eq!(store.load().await.unwrap(), state);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let dir = tempdir().unwrap();
        let store = JsonSetupStateStore::in_data_root(dir.path());
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(
            store.load().await,
            Err(StoreError::Serialization(_))
        ));
    }
}
