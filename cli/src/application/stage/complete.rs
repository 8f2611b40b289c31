//! Marks a provisioned instance ready and announces it.

use ephemera_common::ProvisioningEvent;
use tracing::info;

use super::StageStatus;
use crate::application::context::StageContext;
use crate::application::remote::RemoteClient;
use crate::domain::error::StageError;
use crate::domain::instance::{InstanceRecord, InstanceStatus};

/// Confirms the machine is reachable and marks it ready.
#[derive(Debug)]
pub struct CompleteSetup {
    instance_id: String,
    record: Option<InstanceRecord>,
    pub(super) client: Option<RemoteClient>,
}

impl CompleteSetup {
    pub const NAME: &'static str = "CompleteSetup";

    #[must_use]
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            record: None,
            client: None,
        }
    }

    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub(super) fn initial_description(&self) -> String {
        "Verifying instance reachability".to_string()
    }

    pub(super) async fn initialize(&mut self, ctx: &StageContext) -> Result<(), StageError> {
        let record = ctx.load_record(Self::NAME, &self.instance_id).await?;
        let Some(host) = record.public_ip.as_deref() else {
            return Err(StageError::failed(
                Self::NAME,
                format!("instance {} has no public IP address", self.instance_id),
            ));
        };
        self.client = Some(ctx.connect(Self::NAME, host).await?);
        self.record = Some(record);
        Ok(())
    }

    pub(super) async fn update(&mut self, ctx: &StageContext) -> Result<StageStatus, StageError> {
        let Some(record) = self.record.as_mut() else {
            return Err(StageError::Contract(format!(
                "{} has no instance record",
                Self::NAME
            )));
        };
        record.status = InstanceStatus::Ready;
        ctx.save_record(Self::NAME, record).await?;
        let public_ip = record.public_ip.clone().unwrap_or_default();
        info!(instance_id = %self.instance_id, %public_ip, "instance ready");
        ctx.notifier
            .notify(ProvisioningEvent::ProvisioningCompleted {
                instance_id: self.instance_id.clone(),
                instance_name: record.name.clone(),
                public_ip,
            })
            .await;
        Ok(StageStatus::Succeeded)
    }
}
