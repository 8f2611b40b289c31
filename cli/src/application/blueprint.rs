//! Dry-run preview of the remote actions a provisioning job would perform.
//!
//! Commands are rendered so template errors surface, but only their templates
//! and argument names are kept. Argument values and stdin never appear.

use serde::Serialize;

use crate::application::stage::{
    DeployCompose, DeploySpec, DeployStep, InstallSoftware, Instruction, deploy_instructions,
    install_instructions,
};
use crate::domain::command::RetryPolicy;
use crate::domain::error::SanitizationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlannedAction {
    Run {
        stage: &'static str,
        label: &'static str,
        template: String,
        args: Vec<String>,
        retries: bool,
        stdin: bool,
    },
    Upload {
        stage: &'static str,
        path: String,
        bytes: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Blueprint {
    pub actions: Vec<PlannedAction>,
}

impl Blueprint {
    /// Software installation followed by deployment of `spec` into `root`.
    ///
    /// # Errors
    ///
    /// The first [`SanitizationError`] any planned command raises.
    pub fn provision_and_deploy(spec: &DeploySpec, root: &str) -> Result<Self, SanitizationError> {
        let mut blueprint = Self::default();
        blueprint.collect(InstallSoftware::NAME, &install_instructions())?;
        for step in DeployStep::ALL {
            blueprint.collect(DeployCompose::NAME, &deploy_instructions(spec, root, step)?)?;
        }
        Ok(blueprint)
    }

    fn collect(
        &mut self,
        stage: &'static str,
        instructions: &[Instruction],
    ) -> Result<(), SanitizationError> {
        for instruction in instructions {
            let action = match instruction {
                Instruction::Run {
                    label,
                    policy,
                    command,
                    stdin,
                    ..
                } => {
                    command.render()?;
                    PlannedAction::Run {
                        stage,
                        label: *label,
                        template: command.template().to_string(),
                        args: command.arg_names().map(str::to_string).collect(),
                        retries: *policy == RetryPolicy::AllowRetries,
                        stdin: stdin.is_some(),
                    }
                }
                Instruction::Upload { path, contents } => PlannedAction::Upload {
                    stage,
                    path: path.clone(),
                    bytes: contents.len(),
                },
            };
            self.actions.push(action);
        }
        Ok(())
    }

    #[must_use]
    pub fn uploads(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, PlannedAction::Upload { .. }))
            .count()
    }
}
