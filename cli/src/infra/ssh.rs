//! OpenSSH implementation of the `SshConnector` / `SshSession` ports.
//!
//! Every session multiplexes its commands over one control master whose
//! socket lives in a private temporary directory. The directory (and with it
//! the socket) is removed on `close` or when the session is dropped.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Error;
use async_trait::async_trait;
use tempfile::TempDir;
use tracing::debug;

use crate::application::ports::{CommandOutput, CommandRunner, SshConnector, SshSession};
use crate::domain::TransportError;
use crate::domain::config::SshConfig;
use crate::infra::command_runner::CommandTimedOut;

/// Exit status `ssh` itself uses for connection-level failures.
const SSH_CONNECTION_ERROR: i32 = 255;

/// stderr fragments after which retrying cannot help.
const REJECTION_MARKERS: &[&str] = &[
    "permission denied",
    "host key verification failed",
    "could not resolve hostname",
    "no such identity",
    "bad configuration option",
    "too many authentication failures",
];

/// Connection options shared by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSshOptions {
    pub user: String,
    pub port: u16,
    pub identity_file: Option<PathBuf>,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl From<&SshConfig> for OpenSshOptions {
    fn from(config: &SshConfig) -> Self {
        Self {
            user: config.user.clone(),
            port: config.port,
            identity_file: config.identity_file.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            command_timeout: config.command_timeout(),
        }
    }
}

impl OpenSshOptions {
    fn base_args(&self, control_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!(
                "UserKnownHostsFile={}",
                control_dir.join("known_hosts").display()
            ),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            "-o".to_string(),
            "ControlMaster=auto".to_string(),
            "-o".to_string(),
            format!("ControlPath={}", control_dir.join("cm").display()),
            "-o".to_string(),
            "ControlPersist=60".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-p".to_string(),
            self.port.to_string(),
            "-l".to_string(),
            self.user.clone(),
        ];
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
            args.push("-o".to_string());
            args.push("IdentitiesOnly=yes".to_string());
        }
        args
    }
}

/// Opens sessions by shelling out to the `ssh` binary.
pub struct OpenSshConnector<R> {
    runner: Arc<R>,
    options: OpenSshOptions,
}

impl<R: CommandRunner> OpenSshConnector<R> {
    #[must_use]
    pub fn new(runner: Arc<R>, options: OpenSshOptions) -> Self {
        Self { runner, options }
    }
}

#[async_trait]
impl<R: CommandRunner + 'static> SshConnector for OpenSshConnector<R> {
    async fn connect(&self, host: &str) -> Result<Box<dyn SshSession>, TransportError> {
        let control_dir = tempfile::Builder::new()
            .prefix("ephemera-ssh-")
            .tempdir()
            .map_err(|e| TransportError::Rejected(format!("cannot create control directory: {e}")))?;
        let session = OpenSshSession {
            runner: Arc::clone(&self.runner),
            args: self.options.base_args(control_dir.path()),
            host: host.to_string(),
            connect_timeout: self.options.connect_timeout,
            command_timeout: self.options.command_timeout,
            control_dir: Mutex::new(Some(control_dir)),
        };

        // Starts the control master; later commands reuse it.
        let check = session.exec("true", None).await?;
        if !check.success() {
            return Err(TransportError::Rejected(format!(
                "connectivity check exited with {}: {}",
                check.exit_code,
                check.diagnostic()
            )));
        }
        debug!(host, "ssh control master started");
        Ok(Box::new(session))
    }
}

/// One control-master-backed connection.
pub struct OpenSshSession<R> {
    runner: Arc<R>,
    args: Vec<String>,
    host: String,
    connect_timeout: Duration,
    command_timeout: Duration,
    control_dir: Mutex<Option<TempDir>>,
}

impl<R> OpenSshSession<R> {
    fn take_control_dir(&self) -> Option<TempDir> {
        self.control_dir
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[async_trait]
impl<R: CommandRunner + 'static> SshSession for OpenSshSession<R> {
    async fn exec(
        &self,
        command: &str,
        stdin: Option<&[u8]>,
    ) -> Result<CommandOutput, TransportError> {
        let mut args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        args.push(&self.host);
        args.push(command);

        let result = match stdin {
            Some(input) => {
                self.runner
                    .run_with_stdin("ssh", &args, input, self.command_timeout)
                    .await
            }
            None => {
                self.runner
                    .run_with_timeout("ssh", &args, self.command_timeout)
                    .await
            }
        };
        let output = result.map_err(classify_runner_error)?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        match output.status.code() {
            Some(SSH_CONNECTION_ERROR) => Err(classify_ssh_failure(&stderr)),
            Some(exit_code) => Ok(CommandOutput {
                exit_code,
                stdout,
                stderr,
            }),
            None => Err(TransportError::Unreachable(
                "ssh was terminated by a signal".to_string(),
            )),
        }
    }

    async fn close(&self) {
        let Some(control_dir) = self.take_control_dir() else {
            return;
        };
        let mut args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        args.extend(["-O", "exit", &self.host]);
        if let Err(err) = self
            .runner
            .run_with_timeout("ssh", &args, self.connect_timeout)
            .await
        {
            debug!(host = %self.host, error = %err, "control master exit failed");
        }
        drop(control_dir);
    }
}

fn classify_runner_error(err: Error) -> TransportError {
    if err.downcast_ref::<CommandTimedOut>().is_some() {
        TransportError::Unreachable(err.to_string())
    } else {
        TransportError::Rejected(format!("{err:#}"))
    }
}

fn classify_ssh_failure(stderr: &str) -> TransportError {
    let message = stderr.trim().to_string();
    let lower = message.to_ascii_lowercase();
    if REJECTION_MARKERS.iter().any(|m| lower.contains(m)) {
        TransportError::Rejected(message)
    } else {
        TransportError::Unreachable(message)
    }
}
