use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::error::{Result, TaskReactorError};
use crate::identifier::Identifier;
use crate::registry::{InstanceRegistryRepository, TaskReactorInstance};

/// Instance registry held in a concurrent map keyed by canonical name
#[derive(Debug, Default)]
pub struct InMemoryInstanceRegistry {
    instances: DashMap<Identifier, TaskReactorInstance>,
}

impl InMemoryInstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_active_flag(&self, instance_name: &Identifier, active: bool) -> Result<()> {
        let mut entry = self
            .instances
            .get_mut(instance_name)
            .ok_or_else(|| TaskReactorError::instance_not_found(instance_name))?;

        if entry.is_active == active {
            debug!(instance = %instance_name, is_active = active, "Instance already in target state");
        } else {
            entry.is_active = active;
            info!(instance = %instance_name, is_active = active, "Instance active flag changed");
        }
        Ok(())
    }
}

#[async_trait]
impl InstanceRegistryRepository for InMemoryInstanceRegistry {
    async fn fetch_all(&self) -> Result<Vec<TaskReactorInstance>> {
        Ok(self
            .instances
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn fetch(&self, instance_name: &Identifier) -> Result<TaskReactorInstance> {
        self.instances
            .get(instance_name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TaskReactorError::instance_not_found(instance_name))
    }

    async fn set_active(&self, instance_name: &Identifier) -> Result<()> {
        self.set_active_flag(instance_name, true)
    }

    async fn set_inactive(&self, instance_name: &Identifier) -> Result<()> {
        self.set_active_flag(instance_name, false)
    }

    async fn insert(&self, instance: TaskReactorInstance) -> Result<()> {
        self.instances
            .insert(instance.instance_name.clone(), instance);
        Ok(())
    }

    async fn remove(&self, instance_name: &Identifier) -> Result<bool> {
        Ok(self.instances.remove(instance_name).is_some())
    }
}
