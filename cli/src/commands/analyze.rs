//! `ephemera analyze`: report what a Compose file needs from its host.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::domain::manifest::ComposeDocument;

/// Arguments for the analyze command.
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Compose file to analyze
    pub file: PathBuf,
}

/// Parse the Compose file and render its ports and file dependencies.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid Compose
/// document.
pub fn run(app: &AppContext, args: &AnalyzeArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("cannot read {}", args.file.display()))?;
    let summary = ComposeDocument::parse(&text)
        .and_then(|doc| doc.summarize())
        .with_context(|| format!("cannot analyze {}", args.file.display()))?;
    app.renderer()
        .render_analysis(&args.file.display().to_string(), &summary)
}
