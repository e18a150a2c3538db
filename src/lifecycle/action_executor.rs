//! # Instance Action Executor
//!
//! Applies one operation to a set of instances read from the instance
//! registry. Instances are processed concurrently and independently: a
//! failure for one instance is recorded in the report and never prevents
//! the operation from reaching the others.

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Result, TaskReactorError};
use crate::identifier::Identifier;
use crate::registry::{InstanceRegistryRepository, TaskReactorInstance};

/// Which registry entries an operation is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceSelector {
    /// Every instance present in the registry, regardless of its flags
    #[default]
    AllExisting,
    /// Only instances that are initialized and active
    ActiveOnly,
}

impl InstanceSelector {
    pub fn matches(&self, instance: &TaskReactorInstance) -> bool {
        match self {
            Self::AllExisting => true,
            Self::ActiveOnly => instance.is_initialized && instance.is_active,
        }
    }
}

/// Per-instance outcome of a fan-out
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanOutReport {
    pub succeeded: Vec<Identifier>,
    pub failed: Vec<(Identifier, TaskReactorError)>,
}

impl FanOutReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

#[derive(Clone)]
pub struct TaskReactorInstanceActionExecutor {
    instance_registry: Arc<dyn InstanceRegistryRepository>,
}

impl std::fmt::Debug for TaskReactorInstanceActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskReactorInstanceActionExecutor").finish()
    }
}

impl TaskReactorInstanceActionExecutor {
    pub fn new(instance_registry: Arc<dyn InstanceRegistryRepository>) -> Self {
        Self { instance_registry }
    }

    pub async fn apply_to_all_existing_instances<F, Fut>(&self, operation: F) -> Result<FanOutReport>
    where
        F: Fn(Identifier) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.apply(InstanceSelector::AllExisting, operation).await
    }

    /// Only fails when the registry itself cannot be read
    pub async fn apply<F, Fut>(&self, selector: InstanceSelector, operation: F) -> Result<FanOutReport>
    where
        F: Fn(Identifier) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let targets: Vec<Identifier> = self
            .instance_registry
            .fetch_all()
            .await?
            .into_iter()
            .filter(|instance| selector.matches(instance))
            .map(|instance| instance.instance_name)
            .collect();

        debug!(selector = ?selector, instances = targets.len(), "Applying action to instances");

        let results = join_all(targets.into_iter().map(|instance| {
            let pending = operation(instance.clone());
            async move { (instance, pending.await) }
        }))
        .await;

        let mut report = FanOutReport::default();
        for (instance, result) in results {
            match result {
                Ok(()) => report.succeeded.push(instance),
                Err(e) => {
                    warn!(instance = %instance, error = %e, "Action failed for instance");
                    report.failed.push((instance, e));
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryInstanceRegistry;
    use parking_lot::Mutex;

    async fn registry_with(instances: &[(&str, bool, bool)]) -> Arc<InMemoryInstanceRegistry> {
        let registry = Arc::new(InMemoryInstanceRegistry::new());
        for (name, initialized, active) in instances {
            registry
                .insert(TaskReactorInstance::new(
                    Identifier::from_with_auto_quoting(name),
                    *initialized,
                    *active,
                ))
                .await
                .unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_empty_registry_is_a_noop() {
        let executor = TaskReactorInstanceActionExecutor::new(registry_with(&[]).await);
        let report = executor
            .apply_to_all_existing_instances(|_| async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(report.total(), 0);
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_active_only_selector() {
        let registry = registry_with(&[("a", true, true), ("b", true, false), ("c", false, true)]).await;
        let visited = Mutex::new(Vec::new());
        let executor = TaskReactorInstanceActionExecutor::new(registry);

        executor
            .apply(InstanceSelector::ActiveOnly, |instance| {
                visited.lock().push(instance);
                async { Ok(()) }
            })
            .await
            .unwrap();

        assert_eq!(*visited.lock(), vec![Identifier::from_with_auto_quoting("A")]);
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_other_instances() {
        let registry = registry_with(&[("a", true, true), ("b", true, true), ("c", true, false)]).await;
        let executor = TaskReactorInstanceActionExecutor::new(registry);
        let broken = Identifier::from_with_auto_quoting("b");

        let report = executor
            .apply_to_all_existing_instances(|instance| {
                let broken = broken.clone();
                async move {
                    if instance == broken {
                        Err(TaskReactorError::store_unavailable("commands_queue", "connection reset"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, broken);
        assert!(!report.is_success());
    }
}
