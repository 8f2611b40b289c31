//! Remote execution client.
//!
//! Wraps an [`SshSession`] with the engine's command vocabulary: templated
//! commands, secret screening, redaction and bounded retries.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::application::ports::{CommandOutput, SecretScanner, SshConnector, SshSession};
use crate::domain::command::{
    CommandTemplate, RenderedCommand, RetryPolicy, Sensitivity, redact,
};
use crate::domain::config::EngineConfig;
use crate::domain::{RemoteError, TransportError};

/// Retry and connect timing for a [`RemoteClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub connect_window: Duration,
    pub connect_interval: Duration,
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for RemoteSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            connect_window: config.ssh.connect_window(),
            connect_interval: config.ssh.connect_interval(),
            max_attempts: config.retry.max_attempts.max(1),
            backoff_step: config.retry.backoff_step(),
        }
    }
}

pub struct RemoteClient {
    host: String,
    session: Box<dyn SshSession>,
    scanner: Arc<dyn SecretScanner>,
    settings: RemoteSettings,
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl RemoteClient {
    /// Open a session to `host`, retrying unreachable hosts every
    /// `connect_interval` until `connect_window` has elapsed.
    ///
    /// # Errors
    ///
    /// [`RemoteError::ConnectRejected`] immediately on authentication or
    /// configuration failures; [`RemoteError::ConnectTimeout`] once the window
    /// is exhausted.
    pub async fn connect(
        connector: &dyn SshConnector,
        scanner: Arc<dyn SecretScanner>,
        host: &str,
        settings: RemoteSettings,
    ) -> Result<Self, RemoteError> {
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match connector.connect(host).await {
                Ok(session) => {
                    debug!(host, attempt, "ssh session established");
                    return Ok(Self {
                        host: host.to_string(),
                        session,
                        scanner,
                        settings,
                    });
                }
                Err(TransportError::Rejected(reason)) => {
                    return Err(RemoteError::ConnectRejected {
                        host: host.to_string(),
                        reason,
                    });
                }
                Err(TransportError::Unreachable(reason)) => {
                    let waited = started.elapsed();
                    if waited + settings.connect_interval > settings.connect_window {
                        return Err(RemoteError::ConnectTimeout {
                            host: host.to_string(),
                            waited_secs: waited.as_secs(),
                            reason,
                        });
                    }
                    debug!(host, attempt, %reason, "host unreachable, retrying");
                    sleep(settings.connect_interval).await;
                }
            }
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Render and run `command`, returning its stdout.
    ///
    /// # Errors
    ///
    /// Sanitization and secret findings fail before anything is sent. A
    /// non-zero exit is [`RemoteError::CommandFailed`] with redacted output.
    pub async fn execute(
        &self,
        policy: RetryPolicy,
        sensitivity: Sensitivity,
        command: &CommandTemplate,
    ) -> Result<String, RemoteError> {
        let rendered = self.prepare(command)?;
        let output = self
            .run_with_retries(policy, sensitivity, &rendered, None, &[])
            .await?;
        Ok(output.stdout)
    }

    /// Like [`RemoteClient::execute`] with `stdin` piped to the command.
    /// The stdin text is treated as a secret: it is never scanned, logged or
    /// echoed back in errors.
    ///
    /// # Errors
    ///
    /// See [`RemoteClient::execute`].
    pub async fn execute_with_stdin(
        &self,
        policy: RetryPolicy,
        sensitivity: Sensitivity,
        command: &CommandTemplate,
        stdin: &str,
    ) -> Result<String, RemoteError> {
        let rendered = self.prepare(command)?;
        let extra = [stdin.trim()];
        let output = self
            .run_with_retries(policy, sensitivity, &rendered, Some(stdin.as_bytes()), &extra)
            .await?;
        Ok(output.stdout)
    }

    /// Write `contents` to `path` on the remote host.
    ///
    /// # Errors
    ///
    /// [`RemoteError::TransferFailed`] once retries are exhausted.
    pub async fn transfer_file(
        &self,
        policy: RetryPolicy,
        path: &str,
        contents: &[u8],
    ) -> Result<(), RemoteError> {
        let command = CommandTemplate::new("cat > @path").arg("path", path);
        let rendered = self.prepare(&command)?;
        self.run_with_retries(
            policy,
            Sensitivity::ContainsNoSensitiveData,
            &rendered,
            Some(contents),
            &[],
        )
        .await
        .map(drop)
        .map_err(|err| match err {
            RemoteError::CommandFailed { output, .. } | RemoteError::Transport(output) => {
                RemoteError::TransferFailed {
                    path: path.to_string(),
                    reason: output,
                }
            }
            other => other,
        })
    }

    pub async fn close(&self) {
        self.session.close().await;
    }

    fn prepare(&self, command: &CommandTemplate) -> Result<RenderedCommand, RemoteError> {
        let rendered = command.render()?;
        if let Some(rule) = self.scanner.scan(rendered.as_str()) {
            warn!(host = %self.host, rule = %rule, "refusing to send command containing a secret");
            return Err(RemoteError::SecretDetected(rule));
        }
        Ok(rendered)
    }

    async fn run_with_retries(
        &self,
        policy: RetryPolicy,
        sensitivity: Sensitivity,
        rendered: &RenderedCommand,
        stdin: Option<&[u8]>,
        extra_secrets: &[&str],
    ) -> Result<CommandOutput, RemoteError> {
        let attempts = match policy {
            RetryPolicy::AllowRetries => self.settings.max_attempts.max(1),
            RetryPolicy::ProhibitRetries => 1,
        };
        let mut attempt = 1;
        loop {
            match self
                .run_once(sensitivity, rendered, stdin, extra_secrets)
                .await
            {
                Ok(output) => return Ok(output),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    let backoff = self.settings.backoff_step * attempt;
                    warn!(
                        host = %self.host,
                        command = %rendered,
                        attempt,
                        max_attempts = attempts,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "remote command failed, retrying"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn run_once(
        &self,
        sensitivity: Sensitivity,
        rendered: &RenderedCommand,
        stdin: Option<&[u8]>,
        extra_secrets: &[&str],
    ) -> Result<CommandOutput, RemoteError> {
        let scrub = |text: &str| redact(&rendered.redact(text), extra_secrets);
        debug!(host = %self.host, command = %rendered, "running remote command");

        let output = self
            .session
            .exec(rendered.as_str(), stdin)
            .await
            .map_err(|err| RemoteError::Transport(scrub(&err.to_string())))?;

        match sensitivity {
            Sensitivity::ContainsNoSensitiveData => {
                debug!(
                    host = %self.host,
                    exit_code = output.exit_code,
                    stdout = %scrub(output.stdout.trim()),
                    stderr = %scrub(output.stderr.trim()),
                    "remote command finished"
                );
            }
            Sensitivity::MayContainSensitiveData => {
                debug!(host = %self.host, exit_code = output.exit_code, "remote command finished");
            }
        }

        if output.success() {
            Ok(output)
        } else {
            Err(RemoteError::CommandFailed {
                exit_code: output.exit_code,
                output: scrub(output.diagnostic()),
            })
        }
    }
}
