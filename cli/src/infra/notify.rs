//! `Notifier` that turns provisioning events into structured log lines.

use async_trait::async_trait;
use ephemera_common::ProvisioningEvent;
use tracing::{info, warn};

use crate::application::ports::Notifier;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: ProvisioningEvent) {
        let name = event.name();
        match &event {
            ProvisioningEvent::ProvisioningStarted {
                instance_id,
                plan_id,
            } => info!(event = name, %instance_id, %plan_id, "provisioning started"),
            ProvisioningEvent::ProvisioningCompleted {
                instance_id,
                instance_name,
                public_ip,
            } => info!(
                event = name,
                %instance_id,
                %instance_name,
                %public_ip,
                "provisioning completed"
            ),
            ProvisioningEvent::DeploymentCompleted {
                instance_id,
                public_ip,
                ports,
            } => {
                let ports: Vec<String> = ports.iter().map(ToString::to_string).collect();
                info!(
                    event = name,
                    %instance_id,
                    %public_ip,
                    ports = %ports.join(","),
                    "deployment completed"
                );
            }
            ProvisioningEvent::DeploymentFailed {
                instance_id,
                reason,
            } => warn!(event = name, %instance_id, %reason, "deployment failed"),
        }
    }
}
