//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, OutputFlags};
use crate::commands;

/// Provision machines and deploy Docker Compose projects onto them
#[derive(Parser)]
#[command(
    name = "ephemera",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show ports and files a Compose file needs
    Analyze(commands::analyze::AnalyzeArgs),

    /// Preview the remote actions of provisioning and deployment
    Plan(commands::plan::PlanArgs),

    /// Run a templated command on a remote host over SSH
    Exec(commands::exec::ExecArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or the command
    /// fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            no_color,
            quiet,
            json,
            command,
        } = self;
        let app = AppContext::new(&OutputFlags {
            no_color,
            quiet,
            json,
        })?;
        match command {
            Command::Analyze(args) => commands::analyze::run(&app, &args),
            Command::Plan(args) => commands::plan::run(&app, args).await,
            Command::Exec(args) => commands::exec::run(&app, args).await,
            Command::Version => commands::version::run(&app),
        }
    }
}
