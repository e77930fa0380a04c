//! Adapters for the provisioning and persistence ports.

mod store;
mod venv;

pub use store::JsonSetupStateStore;
pub use venv::{PROVISIONER_SERVICE, VenvProvisioner, manifest_digest};
