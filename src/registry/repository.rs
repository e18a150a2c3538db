//! # Instance Registry Repository
//!
//! The registry is the sole owner of the `is_initialized` / `is_active`
//! flags. `set_active` and `set_inactive` are the only entry points that
//! mutate `is_active`; both are idempotent and last writer wins.

use async_trait::async_trait;

use crate::error::Result;
use crate::identifier::Identifier;
use crate::registry::TaskReactorInstance;

#[async_trait]
pub trait InstanceRegistryRepository: Send + Sync {
    /// Every registered instance, in no particular order
    async fn fetch_all(&self) -> Result<Vec<TaskReactorInstance>>;

    /// Fails with `InstanceNotFound` when the instance is not registered
    async fn fetch(&self, instance_name: &Identifier) -> Result<TaskReactorInstance>;

    async fn set_active(&self, instance_name: &Identifier) -> Result<()>;

    async fn set_inactive(&self, instance_name: &Identifier) -> Result<()>;

    /// Provisioning hook, replaces an existing row with the same name
    async fn insert(&self, instance: TaskReactorInstance) -> Result<()>;

    /// Deprovisioning hook, returns whether a row was removed
    async fn remove(&self, instance_name: &Identifier) -> Result<bool>;
}
