//! Instance provisioning: create, install, then complete setup.

use super::Flow;
use crate::application::context::StageContext;
use crate::application::stage::{CompleteSetup, CreateInstance, InstallSoftware, Phase, Stage};
use crate::domain::error::FlowError;

/// `CreateInstance → InstallSoftware → CompleteSetup`.
#[derive(Debug, Clone)]
pub struct InstanceProvisionFlow {
    instance_id: String,
    plan_id: String,
}

impl InstanceProvisionFlow {
    pub const NAME: &'static str = "InstanceProvisionFlow";

    #[must_use]
    pub fn new(instance_id: impl Into<String>, plan_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            plan_id: plan_id.into(),
        }
    }
}

impl Flow for InstanceProvisionFlow {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initial_stage(&self, _ctx: &StageContext) -> Result<Stage, FlowError> {
        Ok(CreateInstance::new(&self.instance_id, &self.plan_id).into())
    }

    fn next_stage(
        &self,
        _ctx: &StageContext,
        current: &Stage,
    ) -> Result<Option<Stage>, FlowError> {
        match current.phase() {
            Phase::CreateInstance(_) => {
                let provisioned = current.provisioned().ok_or(FlowError::MissingOutcome {
                    flow: Self::NAME,
                    stage: CreateInstance::NAME,
                })?;
                Ok(Some(
                    InstallSoftware::new(&provisioned.instance_id, &provisioned.public_ip).into(),
                ))
            }
            Phase::InstallSoftware(_) => Ok(Some(CompleteSetup::new(&self.instance_id).into())),
            Phase::CompleteSetup(_) => Ok(None),
            Phase::DeployCompose(_) => Err(FlowError::UnexpectedStage {
                flow: Self::NAME,
                stage: current.name(),
            }),
        }
    }
}
