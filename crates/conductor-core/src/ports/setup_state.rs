//! Persisted first-run setup state.
//!
//! Read once at startup, written once per completed installation. The
//! storage mechanism belongs to the implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::StoreError;

/// Selected environment and whether setup finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SetupState {
    pub environment_path: Option<PathBuf>,
    pub setup_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SetupState {
    /// State recorded after a successful installation.
    pub fn completed(environment_path: impl Into<PathBuf>) -> Self {
        Self {
            environment_path: Some(environment_path.into()),
            setup_completed: true,
            completed_at: Some(Utc::now()),
        }
    }
}

/// Repository for the setup state record.
#[async_trait]
pub trait SetupStateRepository: Send + Sync {
    /// Load the state. Returns the default state if nothing is stored.
    async fn load(&self) -> Result<SetupState, StoreError>;

    async fn save(&self, state: &SetupState) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_state() {
        let state = SetupState::completed("/data/venv");
        assert!(state.setup_completed);
        assert_eq!(state.environment_path, Some(PathBuf::from("/data/venv")));
        assert!(state.completed_at.is_some());
    }

    #[test]
    fn test_missing_fields_default() {
        let state: SetupState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, SetupState::default());

        let json = serde_json::to_string(&SetupState::completed("/x")).unwrap();
        assert!(json.contains("\"setupCompleted\":true"));
        assert!(json.contains("\"environmentPath\":\"/x\""));
    }
}
