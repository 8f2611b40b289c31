//! Installs the container runtime and tunes the host kernel over SSH.

use tracing::info;

use super::{Instruction, StageStatus};
use crate::application::context::StageContext;
use crate::application::remote::RemoteClient;
use crate::domain::command::{CommandTemplate, RetryPolicy, Sensitivity};
use crate::domain::error::StageError;

const KERNEL_TUNING: &str = "vm.max_map_count=262144\nfs.inotify.max_user_watches=524288\n";

/// Ordered machine setup, one command per update.
pub(crate) fn install_instructions() -> Vec<Instruction> {
    let run = |label, template: &str| {
        Instruction::run(
            label,
            RetryPolicy::AllowRetries,
            Sensitivity::ContainsNoSensitiveData,
            CommandTemplate::new(template),
        )
    };
    vec![
        run(
            "Installing container runtime",
            "command -v docker >/dev/null 2>&1 || curl -fsSL https://get.docker.com | sudo sh",
        ),
        run(
            "Installing compose plugin",
            "sudo apt-get update -qq && sudo DEBIAN_FRONTEND=noninteractive apt-get install -y -qq docker-compose-plugin",
        ),
        run(
            "Enabling container daemon",
            "sudo systemctl enable --now docker",
        ),
        run(
            "Granting docker group membership",
            "sudo usermod -aG docker \"$(id -un)\"",
        ),
        Instruction::run(
            "Tuning kernel parameters",
            RetryPolicy::AllowRetries,
            Sensitivity::ContainsNoSensitiveData,
            CommandTemplate::new(
                "printf '%s' @settings | sudo tee /etc/sysctl.d/99-ephemera.conf >/dev/null && sudo sysctl --system",
            )
            .arg("settings", KERNEL_TUNING),
        ),
    ]
}

#[derive(Debug)]
pub struct InstallSoftware {
    instance_id: String,
    host: String,
    instructions: Vec<Instruction>,
    next: usize,
    pub(super) client: Option<RemoteClient>,
}

impl InstallSoftware {
    pub const NAME: &'static str = "InstallSoftware";

    #[must_use]
    pub fn new(instance_id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            host: host.into(),
            instructions: install_instructions(),
            next: 0,
            client: None,
        }
    }

    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    pub(super) fn initial_description(&self) -> String {
        "Connecting to instance".to_string()
    }

    pub(super) async fn initialize(&mut self, ctx: &StageContext) -> Result<(), StageError> {
        self.client = Some(ctx.connect(Self::NAME, &self.host).await?);
        Ok(())
    }

    pub(super) async fn update(&mut self, _ctx: &StageContext) -> Result<StageStatus, StageError> {
        let Some(client) = self.client.as_ref() else {
            return Err(StageError::Contract(format!("{} has no session", Self::NAME)));
        };
        let Some(instruction) = self.instructions.get(self.next) else {
            return Ok(StageStatus::Succeeded);
        };
        if let Instruction::Run { label, .. } = instruction {
            info!(instance_id = %self.instance_id, step = *label, "installing software");
        }
        instruction
            .apply(client)
            .await
            .map_err(|source| StageError::Remote {
                stage: Self::NAME,
                source,
            })?;
        self.next += 1;

        match self.instructions.get(self.next) {
            None => Ok(StageStatus::Succeeded),
            Some(Instruction::Run { label, .. }) => Ok(StageStatus::InProgress((*label).to_string())),
            Some(Instruction::Upload { path, .. }) => {
                Ok(StageStatus::InProgress(format!("Uploading {path}")))
            }
        }
    }
}
