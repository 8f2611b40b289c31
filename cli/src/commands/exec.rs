//! `ephemera exec`: run one templated command on a remote host.

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::exec::{ExecRequest, run_remote_command};
use crate::commands::parse_key_value;
use crate::domain::command::{CommandTemplate, RetryPolicy};

/// Arguments for the exec command.
#[derive(Args)]
pub struct ExecArgs {
    /// Host name or address to connect to
    #[arg(long)]
    pub host: String,

    /// Command template; `@name` inserts a quoted argument, `@@name` a raw one
    pub template: String,

    /// Template argument (repeatable)
    #[arg(long = "arg", value_name = "NAME=VALUE", value_parser = parse_key_value)]
    pub args: Vec<(String, String)>,

    /// Retry non-zero exits with linear backoff
    #[arg(long)]
    pub retry: bool,
}

/// Run the command and render its stdout.
///
/// # Errors
///
/// Returns an error if the template is incomplete, the host cannot be
/// reached, or the command exits non-zero.
pub async fn run(app: &AppContext, args: ExecArgs) -> Result<()> {
    let command = args
        .args
        .into_iter()
        .fold(CommandTemplate::new(args.template), |cmd, (name, value)| {
            cmd.arg(name, value)
        });
    let request = ExecRequest {
        host: args.host,
        command,
        policy: if args.retry {
            RetryPolicy::AllowRetries
        } else {
            RetryPolicy::ProhibitRetries
        },
    };

    let reporter = app.reporter();
    let stdout = match run_remote_command(
        &app.ssh_connector(),
        app.secret_scanner(),
        app.remote_settings(),
        &request,
        &reporter,
    )
    .await
    {
        Ok(stdout) => stdout,
        Err(err) => {
            reporter.fail("Command failed");
            return Err(err).with_context(|| format!("exec on {} failed", request.host));
        }
    };
    drop(reporter);

    app.renderer().render_exec(&request.host, &stdout)
}
