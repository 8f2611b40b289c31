//! `ephemera plan`: dry run of provisioning plus a Compose deployment.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::blueprint::Blueprint;
use crate::application::flow::ComposeDeployFlow;
use crate::commands::{parse_key_value, parse_registry};
use crate::domain::instance::RegistryCredential;

/// Arguments for the plan command.
#[derive(Args)]
pub struct PlanArgs {
    /// Compose file, relative to --dir (repeatable, merged in order)
    #[arg(long = "compose", short = 'f', required = true)]
    pub compose_files: Vec<String>,

    /// Project directory holding the compose files
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Build argument passed to `docker compose build` (repeatable)
    #[arg(long = "build-arg", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub build_args: Vec<(String, String)>,

    /// Registry to log in to before pulling (repeatable)
    #[arg(long = "registry", value_name = "SERVER=USER:PASSWORD", value_parser = parse_registry)]
    pub registries: Vec<RegistryCredential>,
}

/// Collect the project files and print the actions a job would perform.
///
/// # Errors
///
/// Returns an error if a compose file or a file it references cannot be
/// read, or if a planned command fails to render.
pub async fn run(app: &AppContext, args: PlanArgs) -> Result<()> {
    let source = app.project_source(&args.dir);
    let flow = ComposeDeployFlow::from_sources(
        &source,
        "plan",
        args.compose_files,
        args.build_args,
        args.registries,
    )
    .await?;
    let blueprint = Blueprint::provision_and_deploy(flow.spec(), &app.config.deployment.root)
        .context("cannot plan deployment")?;
    app.renderer().render_blueprint(&blueprint)
}
