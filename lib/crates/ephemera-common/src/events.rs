//! Provisioning lifecycle events consumed by observers outside the engine
//! (chat alerts, audit log).

use serde::{Deserialize, Serialize};

use crate::ports::ExposedPortRange;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvisioningEvent {
    ProvisioningStarted {
        instance_id: String,
        plan_id: String,
    },
    ProvisioningCompleted {
        instance_id: String,
        instance_name: String,
        public_ip: String,
    },
    DeploymentCompleted {
        instance_id: String,
        public_ip: String,
        ports: Vec<ExposedPortRange>,
    },
    DeploymentFailed {
        instance_id: String,
        reason: String,
    },
}

impl ProvisioningEvent {
    #[must_use]
    pub fn instance_id(&self) -> &str {
        match self {
            Self::ProvisioningStarted { instance_id, .. }
            | Self::ProvisioningCompleted { instance_id, .. }
            | Self::DeploymentCompleted { instance_id, .. }
            | Self::DeploymentFailed { instance_id, .. } => instance_id,
        }
    }

    /// Stable event name, matching the serialized `event` tag.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProvisioningStarted { .. } => "provisioning_started",
            Self::ProvisioningCompleted { .. } => "provisioning_completed",
            Self::DeploymentCompleted { .. } => "deployment_completed",
            Self::DeploymentFailed { .. } => "deployment_failed",
        }
    }
}
