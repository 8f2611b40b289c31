//! Provisioning stages.
//!
//! A [`Stage`] moves through `Created → Initialized → Succeeded | Failed`.
//! [`Stage::initialize`] performs the side-effecting kickoff exactly once;
//! [`Stage::update`] is polled until it reports [`StageStatus::Succeeded`] and
//! never repeats the kickoff.

use std::fmt;

use tracing::debug;

use crate::application::context::StageContext;
use crate::application::remote::RemoteClient;
use crate::domain::command::{CommandTemplate, RetryPolicy, Sensitivity};
use crate::domain::error::{RemoteError, StageError};
use crate::domain::instance::ProvisionedInstance;

mod complete;
mod create;
mod deploy;
mod install;

pub use complete::CompleteSetup;
pub use create::CreateInstance;
pub use deploy::{DeployCompose, DeploySpec, DeployStep};
pub use install::InstallSoftware;

pub(crate) use deploy::deploy_instructions;
pub(crate) use install::install_instructions;

/// Result of one [`Stage::update`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    InProgress(String),
    Succeeded,
}

/// The phase a stage performs, with its inputs and live handles.
#[derive(Debug)]
pub enum Phase {
    CreateInstance(CreateInstance),
    InstallSoftware(InstallSoftware),
    DeployCompose(DeployCompose),
    CompleteSetup(CompleteSetup),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Initialized,
    Succeeded,
    Failed,
}

#[derive(Debug)]
pub struct Stage {
    phase: Phase,
    lifecycle: Lifecycle,
    description: String,
}

impl Stage {
    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match &self.phase {
            Phase::CreateInstance(_) => CreateInstance::NAME,
            Phase::InstallSoftware(_) => InstallSoftware::NAME,
            Phase::DeployCompose(_) => DeployCompose::NAME,
            Phase::CompleteSetup(_) => CompleteSetup::NAME,
        }
    }

    /// Human-readable progress, updated by every `InProgress` result.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.lifecycle == Lifecycle::Succeeded
    }

    /// Network identity produced by a succeeded `CreateInstance` stage.
    #[must_use]
    pub fn provisioned(&self) -> Option<&ProvisionedInstance> {
        match &self.phase {
            Phase::CreateInstance(stage) if self.is_succeeded() => stage.provisioned(),
            _ => None,
        }
    }

    /// Perform the kickoff.
    ///
    /// # Errors
    ///
    /// [`StageError::Contract`] if called twice; otherwise whatever the phase
    /// raises, after which the stage is `Failed`.
    pub async fn initialize(&mut self, ctx: &StageContext) -> Result<(), StageError> {
        if self.lifecycle != Lifecycle::Created {
            return Err(StageError::Contract(format!(
                "{} initialized more than once",
                self.name()
            )));
        }
        let result = match &mut self.phase {
            Phase::CreateInstance(stage) => stage.initialize(ctx).await,
            Phase::InstallSoftware(stage) => stage.initialize(ctx).await,
            Phase::DeployCompose(stage) => stage.initialize(ctx).await,
            Phase::CompleteSetup(stage) => stage.initialize(ctx).await,
        };
        self.lifecycle = if result.is_ok() {
            Lifecycle::Initialized
        } else {
            Lifecycle::Failed
        };
        result
    }

    /// Advance the phase by one poll.
    ///
    /// # Errors
    ///
    /// [`StageError::Contract`] before `initialize` or after a failure;
    /// otherwise whatever the phase raises.
    pub async fn update(&mut self, ctx: &StageContext) -> Result<StageStatus, StageError> {
        match self.lifecycle {
            Lifecycle::Initialized => {}
            Lifecycle::Succeeded => return Ok(StageStatus::Succeeded),
            Lifecycle::Created => {
                return Err(StageError::Contract(format!(
                    "{} updated before initialize",
                    self.name()
                )));
            }
            Lifecycle::Failed => {
                return Err(StageError::Contract(format!(
                    "{} updated after it failed",
                    self.name()
                )));
            }
        }
        let result = match &mut self.phase {
            Phase::CreateInstance(stage) => stage.update(ctx).await,
            Phase::InstallSoftware(stage) => stage.update(ctx).await,
            Phase::DeployCompose(stage) => stage.update(ctx).await,
            Phase::CompleteSetup(stage) => stage.update(ctx).await,
        };
        match &result {
            Ok(StageStatus::InProgress(description)) => {
                self.description.clone_from(description);
            }
            Ok(StageStatus::Succeeded) => self.lifecycle = Lifecycle::Succeeded,
            Err(_) => self.lifecycle = Lifecycle::Failed,
        }
        result
    }

    /// Release live handles. Called once the owning flow moves past this
    /// stage, on success and failure alike.
    pub async fn dispose(&mut self) {
        let client = match &mut self.phase {
            Phase::CreateInstance(_) => None,
            Phase::InstallSoftware(stage) => stage.client.take(),
            Phase::DeployCompose(stage) => stage.client.take(),
            Phase::CompleteSetup(stage) => stage.client.take(),
        };
        if let Some(client) = client {
            debug!(stage = self.name(), host = client.host(), "closing ssh session");
            client.close().await;
        }
    }
}

macro_rules! stage_from_phase {
    ($($variant:ident),+) => {
        $(
            impl From<$variant> for Stage {
                fn from(stage: $variant) -> Self {
                    Self {
                        description: stage.initial_description(),
                        phase: Phase::$variant(stage),
                        lifecycle: Lifecycle::Created,
                    }
                }
            }
        )+
    };
}

stage_from_phase!(CreateInstance, InstallSoftware, DeployCompose, CompleteSetup);

// ── Instructions ──────────────────────────────────────────────────────────────

/// One remote action, shared by live stages and the dry-run blueprint.
#[derive(Clone)]
pub enum Instruction {
    Run {
        label: &'static str,
        policy: RetryPolicy,
        sensitivity: Sensitivity,
        command: CommandTemplate,
        /// Piped to the command; redacted like an argument.
        stdin: Option<String>,
    },
    Upload {
        path: String,
        contents: Vec<u8>,
    },
}

impl Instruction {
    pub(crate) fn run(
        label: &'static str,
        policy: RetryPolicy,
        sensitivity: Sensitivity,
        command: CommandTemplate,
    ) -> Self {
        Self::Run {
            label,
            policy,
            sensitivity,
            command,
            stdin: None,
        }
    }

    /// Execute on `client`, returning the command's stdout (empty for uploads).
    pub(crate) async fn apply(&self, client: &RemoteClient) -> Result<String, RemoteError> {
        match self {
            Self::Run {
                policy,
                sensitivity,
                command,
                stdin: Some(input),
                ..
            } => {
                client
                    .execute_with_stdin(*policy, *sensitivity, command, input)
                    .await
            }
            Self::Run {
                policy,
                sensitivity,
                command,
                stdin: None,
                ..
            } => client.execute(*policy, *sensitivity, command).await,
            Self::Upload { path, contents } => client
                .transfer_file(RetryPolicy::AllowRetries, path, contents)
                .await
                .map(|()| String::new()),
        }
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run {
                label,
                command,
                stdin,
                ..
            } => f
                .debug_struct("Run")
                .field("label", label)
                .field("template", &command.template())
                .field("stdin", &stdin.as_ref().map(|_| "***"))
                .finish(),
            Self::Upload { path, contents } => f
                .debug_struct("Upload")
                .field("path", path)
                .field("len", &contents.len())
                .finish(),
        }
    }
}
