//! Ad-hoc remote command execution.

#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::Ordering;

use ephemera_cli::application::RemoteSettings;
use ephemera_cli::application::exec::{ExecRequest, run_remote_command};
use ephemera_cli::domain::{CommandTemplate, RemoteError, RetryPolicy, SanitizationError};

use crate::mocks::{NoSecrets, RecordingReporter, ScriptedConnector, failed, ok};

fn request(command: CommandTemplate) -> ExecRequest {
    ExecRequest {
        host: "203.0.113.7".into(),
        command,
        policy: RetryPolicy::ProhibitRetries,
    }
}

#[tokio::test]
async fn missing_argument_fails_before_connecting() {
    let ssh = ScriptedConnector::succeeding();
    let reporter = RecordingReporter::default();
    let err = run_remote_command(
        &ssh,
        Arc::new(NoSecrets),
        RemoteSettings::default(),
        &request(CommandTemplate::new("docker logs @container")),
        &reporter,
    )
    .await
    .expect_err("missing argument");

    assert!(matches!(
        err,
        RemoteError::Sanitization(SanitizationError::MissingArgument(ref name)) if name == "container"
    ));
    assert_eq!(ssh.connects.load(Ordering::SeqCst), 0);
    assert!(reporter.messages.borrow().is_empty());
}

#[tokio::test]
async fn quoted_argument_reaches_host_and_stdout_is_returned() {
    let ssh = ScriptedConnector::new(|_| ok("web-1 | ready\n"));
    let reporter = RecordingReporter::default();
    let stdout = run_remote_command(
        &ssh,
        Arc::new(NoSecrets),
        RemoteSettings::default(),
        &request(CommandTemplate::new("docker logs @container").arg("container", "web; rm -rf /")),
        &reporter,
    )
    .await
    .expect("command succeeds");

    assert_eq!(stdout, "web-1 | ready\n");
    assert_eq!(ssh.commands(), vec!["docker logs 'web; rm -rf /'"]);
    assert_eq!(ssh.closes.load(Ordering::SeqCst), 1);
    assert_eq!(
        reporter.messages.borrow().last().map(String::as_str),
        Some("ok: Command completed on 203.0.113.7")
    );
}

#[tokio::test]
async fn failed_command_output_is_redacted_and_session_closed() {
    let ssh = ScriptedConnector::new(|_| failed(2, "cannot open hunter2"));
    let reporter = RecordingReporter::default();
    let err = run_remote_command(
        &ssh,
        Arc::new(NoSecrets),
        RemoteSettings::default(),
        &request(CommandTemplate::new("cat @path").arg("path", "hunter2")),
        &reporter,
    )
    .await
    .expect_err("command fails");

    let RemoteError::CommandFailed { exit_code, output } = err else {
        panic!("expected CommandFailed, got {err:?}");
    };
    assert_eq!(exit_code, 2);
    assert!(!output.contains("hunter2"));
    assert_eq!(ssh.commands().len(), 1);
    assert_eq!(ssh.closes.load(Ordering::SeqCst), 1);
}
