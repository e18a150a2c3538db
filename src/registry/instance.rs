use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;

/// One provisioned execution domain as recorded in the instance registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskReactorInstance {
    pub instance_name: Identifier,

    /// Dispatchers never run against an instance that is not initialized
    pub is_initialized: bool,

    /// Whether the dispatcher should currently process the instance queue
    pub is_active: bool,
}

impl TaskReactorInstance {
    pub fn new(instance_name: Identifier, is_initialized: bool, is_active: bool) -> Self {
        Self {
            instance_name,
            is_initialized,
            is_active,
        }
    }

    /// Shape of a freshly provisioned instance
    pub fn provisioned(instance_name: Identifier) -> Self {
        Self::new(instance_name, true, true)
    }
}
