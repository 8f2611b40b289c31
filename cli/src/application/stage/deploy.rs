//! Uploads a Compose project, builds it and starts its services.

use std::collections::BTreeSet;

use ephemera_common::{ExposedPort, ProvisioningEvent, collapse_ranges};
use tracing::{info, warn};

use super::{Instruction, StageStatus};
use crate::application::context::StageContext;
use crate::application::remote::RemoteClient;
use crate::domain::command::{CommandTemplate, RetryPolicy, Sensitivity, shell_quote};
use crate::domain::error::{RemoteError, SanitizationError, StageError};
use crate::domain::instance::{InstanceDockerFile, InstanceRecord, RegistryCredential};
use crate::domain::manifest::ComposeDocument;

/// Everything needed to deploy one Compose project.
#[derive(Debug, Clone, Default)]
pub struct DeploySpec {
    /// Compose files, relative to the deployment directory, in `-f` order.
    pub compose_files: Vec<String>,
    pub files: Vec<InstanceDockerFile>,
    pub build_args: Vec<(String, String)>,
    pub registries: Vec<RegistryCredential>,
}

/// Deployment steps in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    Prepare,
    Upload,
    Login,
    Down,
    Pull,
    Build,
    Up,
    Publish,
}

impl DeployStep {
    pub const ALL: [Self; 8] = [
        Self::Prepare,
        Self::Upload,
        Self::Login,
        Self::Down,
        Self::Pull,
        Self::Build,
        Self::Up,
        Self::Publish,
    ];

    fn next(self) -> Option<Self> {
        let index = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(index + 1).copied()
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Prepare => "Preparing deployment directory",
            Self::Upload => "Uploading project files",
            Self::Login => "Authenticating to container registries",
            Self::Down => "Stopping previous deployment",
            Self::Pull => "Pulling images",
            Self::Build => "Building images",
            Self::Up => "Starting services",
            Self::Publish => "Opening firewall ports",
        }
    }
}

/// Reject absolute paths and any `..` component.
fn safe_relative(path: &str) -> Result<&str, SanitizationError> {
    let trimmed = path.trim_start_matches("./");
    let unsafe_path = trimmed.is_empty()
        || trimmed.starts_with('/')
        || trimmed.split('/').any(|part| part == "..");
    if unsafe_path {
        Err(SanitizationError::UnsafePath(path.to_string()))
    } else {
        Ok(trimmed)
    }
}

fn is_build_arg_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn compose_flags(spec: &DeploySpec) -> Result<String, SanitizationError> {
    let flags = spec
        .compose_files
        .iter()
        .map(|file| safe_relative(file).map(|f| format!("-f {}", shell_quote(f))))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(flags.join(" "))
}

fn build_arg_flags(spec: &DeploySpec) -> Result<String, SanitizationError> {
    let flags = spec
        .build_args
        .iter()
        .map(|(name, value)| {
            if is_build_arg_name(name) {
                Ok(format!("--build-arg {}", shell_quote(&format!("{name}={value}"))))
            } else {
                Err(SanitizationError::InvalidBuildArg(name.clone()))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(flags.join(" "))
}

fn compose(
    label: &'static str,
    policy: RetryPolicy,
    sensitivity: Sensitivity,
    root: &str,
    flags: &str,
    subcommand: &str,
) -> Instruction {
    Instruction::run(
        label,
        policy,
        sensitivity,
        CommandTemplate::new(format!("cd @root && sudo docker compose @@compose_flags {subcommand}"))
            .arg("root", root)
            .arg("compose_flags", flags),
    )
}

/// Remote actions for `step`, deploying `spec` into `root`.
///
/// # Errors
///
/// [`SanitizationError`] for unsafe paths or malformed build argument names.
pub(crate) fn deploy_instructions(
    spec: &DeploySpec,
    root: &str,
    step: DeployStep,
) -> Result<Vec<Instruction>, SanitizationError> {
    use RetryPolicy::{AllowRetries, ProhibitRetries};
    use Sensitivity::{ContainsNoSensitiveData, MayContainSensitiveData};

    let flags = compose_flags(spec)?;
    let instructions = match step {
        DeployStep::Prepare => vec![Instruction::run(
            "Clearing previous deployment",
            AllowRetries,
            ContainsNoSensitiveData,
            CommandTemplate::new(
                "sudo rm -rf @root && sudo mkdir -p @root && sudo chmod 777 @root",
            )
            .arg("root", root),
        )],
        DeployStep::Upload => {
            let mut paths = Vec::with_capacity(spec.files.len());
            for file in &spec.files {
                paths.push(format!("{root}/{}", safe_relative(&file.path)?));
            }
            let parents: BTreeSet<&str> = paths
                .iter()
                .filter_map(|p| p.rsplit_once('/').map(|(dir, _)| dir))
                .filter(|dir| *dir != root)
                .collect();
            let mut out: Vec<Instruction> = parents
                .into_iter()
                .map(|dir| {
                    Instruction::run(
                        "Creating directory",
                        AllowRetries,
                        ContainsNoSensitiveData,
                        CommandTemplate::new("sudo mkdir -p @dir && sudo chmod 777 @dir")
                            .arg("dir", dir),
                    )
                })
                .collect();
            out.extend(
                paths
                    .into_iter()
                    .zip(&spec.files)
                    .map(|(path, file)| Instruction::Upload {
                        path,
                        contents: file.contents.clone(),
                    }),
            );
            out
        }
        DeployStep::Login => spec
            .registries
            .iter()
            .map(|registry| Instruction::Run {
                label: "Logging in to registry",
                policy: AllowRetries,
                sensitivity: MayContainSensitiveData,
                command: CommandTemplate::new(
                    "sudo docker login --username @username --password-stdin @server",
                )
                .arg("username", &registry.username)
                .arg("server", &registry.server),
                stdin: Some(registry.password.clone()),
            })
            .collect(),
        DeployStep::Down => vec![compose(
            "Stopping previous deployment",
            AllowRetries,
            ContainsNoSensitiveData,
            root,
            &flags,
            "down --rmi all --volumes --remove-orphans",
        )],
        DeployStep::Pull => vec![compose(
            "Pulling images",
            AllowRetries,
            ContainsNoSensitiveData,
            root,
            &flags,
            "pull --ignore-buildable",
        )],
        DeployStep::Build => vec![Instruction::run(
            "Building images",
            ProhibitRetries,
            MayContainSensitiveData,
            CommandTemplate::new(
                "cd @root && sudo docker compose @@compose_flags build --no-cache --pull --force-rm --parallel @@build_args",
            )
            .arg("root", root)
            .arg("compose_flags", &flags)
            .arg("build_args", build_arg_flags(spec)?),
        )],
        DeployStep::Up => vec![compose(
            "Starting services",
            ProhibitRetries,
            ContainsNoSensitiveData,
            root,
            &flags,
            "up --detach --force-recreate --remove-orphans",
        )],
        DeployStep::Publish => vec![compose(
            "Resolving effective manifest",
            AllowRetries,
            MayContainSensitiveData,
            root,
            &flags,
            "config",
        )],
    };
    Ok(instructions)
}

/// Ships a Compose project to the instance and starts it.
#[derive(Debug)]
pub struct DeployCompose {
    instance_id: String,
    spec: DeploySpec,
    root: String,
    step: DeployStep,
    record: Option<InstanceRecord>,
    pub(super) client: Option<RemoteClient>,
}

impl DeployCompose {
    pub const NAME: &'static str = "DeployCompose";

    #[must_use]
    pub fn new(instance_id: impl Into<String>, spec: DeploySpec, root: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            spec,
            root: root.into(),
            step: DeployStep::Prepare,
            record: None,
            client: None,
        }
    }

    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    #[must_use]
    pub fn spec(&self) -> &DeploySpec {
        &self.spec
    }

    pub(super) fn initial_description(&self) -> String {
        "Connecting to instance".to_string()
    }

    pub(super) async fn initialize(&mut self, ctx: &StageContext) -> Result<(), StageError> {
        // Validate inputs before touching the machine.
        for step in DeployStep::ALL {
            deploy_instructions(&self.spec, &self.root, step).map_err(|e| StageError::Remote {
                stage: Self::NAME,
                source: e.into(),
            })?;
        }
        let record = ctx.load_record(Self::NAME, &self.instance_id).await?;
        let Some(host) = record.public_ip.clone() else {
            return Err(StageError::failed(
                Self::NAME,
                format!("instance {} has no public IP address", self.instance_id),
            ));
        };
        self.client = Some(ctx.connect(Self::NAME, &host).await?);
        self.record = Some(record);
        Ok(())
    }

    pub(super) async fn update(&mut self, ctx: &StageContext) -> Result<StageStatus, StageError> {
        let (Some(client), Some(record)) = (self.client.as_ref(), self.record.as_ref()) else {
            return Err(StageError::Contract(format!("{} has no session", Self::NAME)));
        };
        let step = self.step;
        let remote = |source: RemoteError| StageError::Remote {
            stage: Self::NAME,
            source,
        };
        info!(instance_id = %self.instance_id, step = step.description(), "deploying compose project");

        let instructions =
            deploy_instructions(&self.spec, &self.root, step).map_err(|e| remote(e.into()))?;
        let mut stdout = String::new();
        for instruction in &instructions {
            match instruction.apply(client).await {
                Ok(out) => stdout = out,
                Err(RemoteError::CommandFailed { output, .. })
                    if matches!(step, DeployStep::Build | DeployStep::Up) =>
                {
                    return Err(self.compose_failed(ctx, client, step, output).await);
                }
                Err(err) => return Err(remote(err)),
            }
        }

        if step == DeployStep::Publish {
            self.publish(ctx, record, &stdout).await?;
            return Ok(StageStatus::Succeeded);
        }
        match step.next() {
            Some(next) => {
                self.step = next;
                Ok(StageStatus::InProgress(next.description().to_string()))
            }
            None => Ok(StageStatus::Succeeded),
        }
    }

    async fn compose_failed(
        &self,
        ctx: &StageContext,
        client: &RemoteClient,
        step: DeployStep,
        output: String,
    ) -> StageError {
        let listing = CommandTemplate::new("ls -la @root").arg("root", &self.root);
        match client
            .execute(
                RetryPolicy::ProhibitRetries,
                Sensitivity::ContainsNoSensitiveData,
                &listing,
            )
            .await
        {
            Ok(listing) => warn!(instance_id = %self.instance_id, %listing, "deployment directory after failure"),
            Err(err) => warn!(instance_id = %self.instance_id, error = %err, "could not list deployment directory"),
        }
        ctx.notifier
            .notify(ProvisioningEvent::DeploymentFailed {
                instance_id: self.instance_id.clone(),
                reason: output.clone(),
            })
            .await;
        let action = if step == DeployStep::Build { "build" } else { "up" };
        StageError::Failed {
            stage: Self::NAME,
            message: format!("docker compose {action} failed"),
            client_payload: Some(output),
        }
    }

    async fn publish(
        &self,
        ctx: &StageContext,
        record: &InstanceRecord,
        manifest: &str,
    ) -> Result<(), StageError> {
        let document = ComposeDocument::parse(manifest).map_err(|source| StageError::Manifest {
            stage: Self::NAME,
            source,
        })?;
        let mut ports = document
            .exposed_ports()
            .map_err(|source| StageError::Manifest {
                stage: Self::NAME,
                source,
            })?;
        ports.insert(ExposedPort::SSH);
        let ranges = collapse_ranges(&ports);

        ctx.cloud
            .open_ports(&record.name, &ranges)
            .await
            .map_err(|source| StageError::Collaborator {
                stage: Self::NAME,
                source,
            })?;
        info!(
            instance_id = %self.instance_id,
            ports = %ranges.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
            "deployment complete"
        );
        ctx.notifier
            .notify(ProvisioningEvent::DeploymentCompleted {
                instance_id: self.instance_id.clone(),
                public_ip: record.public_ip.clone().unwrap_or_default(),
                ports: ranges,
            })
            .await;
        Ok(())
    }
}
