//! Path resolution for conductor data directories.
//!
//! - Data root (setup state, provisioned environment)
//! - Setup-state file location
//! - Normalization of user-supplied paths
//!
//! OS-specific lookups stay private in `platform`.

mod error;
mod platform;

pub use error::PathError;
pub use platform::{
    DATA_DIR_ENV, SETUP_STATE_FILE, data_root, normalize_user_path, setup_state_path,
};
