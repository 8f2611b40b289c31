//! Ephemera - provisioning engine for ephemeral Docker Compose environments

use clap::Parser;
use ephemera_cli::cli::Cli;
use ephemera_cli::output::json::{error_code, format_error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let json = cli.json;
    if let Err(e) = cli.run().await {
        if json && let Ok(text) = format_error(&format!("{e:#}"), error_code(&e)) {
            println!("{text}");
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(1);
    }
}
