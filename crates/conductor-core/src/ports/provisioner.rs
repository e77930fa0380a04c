//! Environment-provisioning collaborator.
//!
//! Creates the isolated runtime environment and installs the declared
//! dependencies into it. The sequencer treats both calls as opaque,
//! awaitable and failable.

use async_trait::async_trait;
use std::path::Path;

use super::ProvisionError;
use crate::domain::EnvironmentHandle;

#[async_trait]
pub trait EnvironmentProvisioner: Send + Sync {
    /// Create (or reuse) an isolated environment under `base`.
    async fn create_isolated_environment(
        &self,
        base: &Path,
    ) -> Result<EnvironmentHandle, ProvisionError>;

    /// Install the dependencies declared in `manifest` into `environment`.
    async fn install_declared_dependencies(
        &self,
        environment: &EnvironmentHandle,
        manifest: &Path,
    ) -> Result<(), ProvisionError>;
}
