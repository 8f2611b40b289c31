//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and the shared common crate,
//! never from `crate::infra`, `crate::commands`, or `crate::output`.

use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use ephemera_common::{ExposedPortRange, ProvisioningEvent};

use crate::domain::TransportError;
use crate::domain::config::EngineConfig;
use crate::domain::instance::{
    CloudInstance, CreateInstanceRequest, InstanceDockerFile, InstanceRecord, OperationId,
    OperationStatus,
};

// ── Value Types ───────────────────────────────────────────────────────────────

/// Result of one remote command. Text is raw and may contain secrets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stderr when present, stdout otherwise, trimmed.
    #[must_use]
    pub fn diagnostic(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts local process execution so infrastructure can be swapped or
/// mocked.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a program and capture its output, killing it after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;

    /// Like [`CommandRunner::run_with_timeout`] with `stdin` piped in.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned, stdin cannot be
    /// written, or the process exceeds `timeout`.
    async fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        stdin: &[u8],
        timeout: Duration,
    ) -> Result<Output>;
}

// ── Cloud Port ────────────────────────────────────────────────────────────────

/// The cloud provider's compute API.
#[async_trait]
pub trait CloudCompute: Send + Sync {
    /// Submit instance creation. Returns the operations to poll.
    async fn create_instance(&self, request: &CreateInstanceRequest) -> Result<Vec<OperationId>>;
    /// Status of each operation, in the order given.
    async fn get_operations(&self, ids: &[OperationId]) -> Result<Vec<OperationStatus>>;
    async fn get_instance(&self, name: &str) -> Result<Option<CloudInstance>>;
    /// Replace the instance's firewall with exactly `ports`.
    async fn open_ports(&self, instance_name: &str, ports: &[ExposedPortRange]) -> Result<()>;
}

// ── Persistence and Notification Ports ────────────────────────────────────────

/// Instance records owned by the surrounding platform.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    async fn load(&self, instance_id: &str) -> Result<Option<InstanceRecord>>;
    async fn save(&self, record: &InstanceRecord) -> Result<()>;
}

/// Sink for provisioning events. Delivery failures are the implementation's
/// concern and never fail a stage.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: ProvisioningEvent);
}

/// Screens rendered commands for credentials before they leave the process.
pub trait SecretScanner: Send + Sync {
    /// Name of the first matching rule, if any.
    fn scan(&self, text: &str) -> Option<String>;
}

// ── SSH Ports ─────────────────────────────────────────────────────────────────

/// Opens sessions to remote hosts.
#[async_trait]
pub trait SshConnector: Send + Sync {
    /// # Errors
    ///
    /// [`TransportError::Unreachable`] for conditions worth retrying,
    /// [`TransportError::Rejected`] otherwise.
    async fn connect(&self, host: &str) -> Result<Box<dyn SshSession>, TransportError>;
}

/// An open connection to one host.
#[async_trait]
pub trait SshSession: Send + Sync {
    /// Run `command` through the remote login shell.
    ///
    /// A non-zero exit is reported in [`CommandOutput::exit_code`], not as an
    /// error.
    async fn exec(
        &self,
        command: &str,
        stdin: Option<&[u8]>,
    ) -> Result<CommandOutput, TransportError>;

    /// Release the connection. Safe to call more than once.
    async fn close(&self);
}

// ── File Source Port ──────────────────────────────────────────────────────────

/// Read access to a local Compose project.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Read the file at `path` (relative to the project, `.` for the project
    /// itself). A directory expands to every regular file below it.
    async fn read(&self, path: &str) -> Result<Vec<InstanceDockerFile>>;
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Loads the engine configuration.
pub trait ConfigStore: Send + Sync {
    /// Load and validate the configuration. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or
    /// validated.
    fn load(&self) -> Result<EngineConfig>;

    /// Path the configuration is read from.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    fn path(&self) -> Result<PathBuf>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait, no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
