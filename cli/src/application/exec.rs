//! One templated command against one host, outside any job.

use std::sync::Arc;

use crate::application::ports::{ProgressReporter, SecretScanner, SshConnector};
use crate::application::remote::{RemoteClient, RemoteSettings};
use crate::domain::command::{CommandTemplate, RetryPolicy, Sensitivity};
use crate::domain::error::RemoteError;

#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub host: String,
    pub command: CommandTemplate,
    pub policy: RetryPolicy,
}

/// Connect to `request.host`, run the command and close the session.
///
/// The template is rendered before connecting, so a missing argument never
/// reaches the network.
///
/// # Errors
///
/// Any [`RemoteError`] from rendering, connecting or executing.
pub async fn run_remote_command(
    connector: &dyn SshConnector,
    scanner: Arc<dyn SecretScanner>,
    settings: RemoteSettings,
    request: &ExecRequest,
    reporter: &impl ProgressReporter,
) -> Result<String, RemoteError> {
    request.command.render()?;

    reporter.step(&format!("Connecting to {}...", request.host));
    let client = RemoteClient::connect(connector, scanner, &request.host, settings).await?;

    reporter.step(&format!("Running {}", request.command.template()));
    let result = client
        .execute(
            request.policy,
            Sensitivity::MayContainSensitiveData,
            &request.command,
        )
        .await;
    client.close().await;

    if result.is_ok() {
        reporter.success(&format!("Command completed on {}", request.host));
    }
    result
}
