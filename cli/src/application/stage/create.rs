//! Cloud instance creation: request, operation polling and the first firewall rule.

use ephemera_common::{ExposedPort, ExposedPortRange, ProvisioningEvent};
use tracing::info;

use super::StageStatus;
use crate::application::context::StageContext;
use crate::domain::error::StageError;
use crate::domain::instance::{
    CloudInstanceState, CreateInstanceRequest, InstanceRecord, OperationId, OperationStatus,
    ProvisionedInstance,
};

/// Submits instance creation and waits for the machine to run.
#[derive(Debug)]
pub struct CreateInstance {
    instance_id: String,
    plan_id: String,
    record: Option<InstanceRecord>,
    operations: Vec<OperationId>,
    provisioned: Option<ProvisionedInstance>,
}

impl CreateInstance {
    pub const NAME: &'static str = "CreateInstance";

    #[must_use]
    pub fn new(instance_id: impl Into<String>, plan_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            plan_id: plan_id.into(),
            record: None,
            operations: Vec::new(),
            provisioned: None,
        }
    }

    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub(super) fn initial_description(&self) -> String {
        "Creating instance".to_string()
    }

    pub(super) fn provisioned(&self) -> Option<&ProvisionedInstance> {
        self.provisioned.as_ref()
    }

    pub(super) async fn initialize(&mut self, ctx: &StageContext) -> Result<(), StageError> {
        let record = ctx.load_record(Self::NAME, &self.instance_id).await?;
        let request = CreateInstanceRequest::for_record(&record, &self.plan_id);
        self.operations = ctx
            .cloud
            .create_instance(&request)
            .await
            .map_err(|source| StageError::Collaborator {
                stage: Self::NAME,
                source,
            })?;
        info!(
            instance_id = %self.instance_id,
            name = %record.name,
            plan_id = %self.plan_id,
            operations = self.operations.len(),
            "instance creation submitted"
        );
        ctx.notifier
            .notify(ProvisioningEvent::ProvisioningStarted {
                instance_id: self.instance_id.clone(),
                plan_id: self.plan_id.clone(),
            })
            .await;
        self.record = Some(record);
        Ok(())
    }

    pub(super) async fn update(&mut self, ctx: &StageContext) -> Result<StageStatus, StageError> {
        let collaborator = |source| StageError::Collaborator {
            stage: Self::NAME,
            source,
        };
        let Some(record) = self.record.as_mut() else {
            return Err(StageError::Contract(format!(
                "{} has no instance record",
                Self::NAME
            )));
        };

        let statuses = ctx
            .cloud
            .get_operations(&self.operations)
            .await
            .map_err(collaborator)?;
        if let Some(reason) = statuses.iter().find_map(|s| match s {
            OperationStatus::Failed { reason } => Some(reason),
            _ => None,
        }) {
            return Err(StageError::failed(
                Self::NAME,
                format!("cloud operation failed: {reason}"),
            ));
        }
        let done = statuses
            .iter()
            .filter(|s| **s == OperationStatus::Succeeded)
            .count();
        if done < statuses.len() {
            return Ok(StageStatus::InProgress(format!(
                "Waiting for cloud operations ({done}/{} complete)",
                statuses.len()
            )));
        }

        let instance = ctx
            .cloud
            .get_instance(&record.name)
            .await
            .map_err(collaborator)?;
        let Some(instance) = instance.filter(|i| i.state == CloudInstanceState::Running) else {
            return Ok(StageStatus::InProgress(
                "Waiting for instance to start".to_string(),
            ));
        };
        let Some(public_ip) = instance.public_ip else {
            return Ok(StageStatus::InProgress(
                "Waiting for a public IP address".to_string(),
            ));
        };

        ctx.cloud
            .open_ports(&record.name, &[ExposedPortRange::from(ExposedPort::SSH)])
            .await
            .map_err(collaborator)?;

        record.public_ip = Some(public_ip.clone());
        ctx.save_record(Self::NAME, record).await?;
        info!(instance_id = %self.instance_id, %public_ip, "instance running");

        self.provisioned = Some(ProvisionedInstance {
            instance_id: self.instance_id.clone(),
            name: record.name.clone(),
            public_ip,
        });
        Ok(StageStatus::Succeeded)
    }
}
