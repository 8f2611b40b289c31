//! Human-readable terminal renderer.

use owo_colors::OwoColorize as _;

use crate::application::blueprint::{Blueprint, PlannedAction};
use crate::domain::manifest::ManifestSummary;
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str) {
        if self.ctx.quiet {
            return;
        }
        println!("ephemera {version}");
    }

    /// Render what a Compose file needs from the machine it runs on.
    pub fn render_analysis(&self, file: &str, summary: &ManifestSummary) {
        self.ctx.header(&format!("Compose file {file}"));
        self.ctx.kv("Services:   ", &join_or_none(&summary.services));
        let ports: Vec<String> = summary.ports.iter().map(ToString::to_string).collect();
        self.ctx.kv("Ports:      ", &join_or_none(&ports));
        self.ctx.kv("Env files:  ", &join_or_none(&summary.env_files));
        self.ctx.kv("Bind mounts:", &join_or_none(&summary.bind_mounts));
        self.ctx.kv("Dockerfiles:", &join_or_none(&summary.dockerfiles));
    }

    /// Render the remote actions of a dry run, one per line.
    pub fn render_blueprint(&self, blueprint: &Blueprint) {
        if self.ctx.quiet {
            return;
        }
        self.ctx.header("Planned actions");
        let mut current_stage = "";
        for action in &blueprint.actions {
            let stage = match action {
                PlannedAction::Run { stage, .. } | PlannedAction::Upload { stage, .. } => *stage,
            };
            if stage != current_stage {
                println!();
                println!("  {}", stage.style(self.ctx.styles.stage));
                current_stage = stage;
            }
            println!("    {}", format_action(action));
            if let PlannedAction::Run { template, .. } = action {
                println!("      {}", template.style(self.ctx.styles.dim));
            }
        }
        println!();
        self.ctx.info(&format!(
            "{} actions, {} uploads",
            blueprint.actions.len(),
            blueprint.uploads()
        ));
    }

    /// Print the remote command's stdout verbatim.
    pub fn render_exec(&self, stdout: &str) {
        print!("{stdout}");
        if !stdout.is_empty() && !stdout.ends_with('\n') {
            println!();
        }
    }
}

/// One-line description of a planned action.
#[must_use]
pub fn format_action(action: &PlannedAction) -> String {
    match action {
        PlannedAction::Run {
            label,
            args,
            retries,
            stdin,
            ..
        } => {
            let mut line = (*label).to_string();
            if !args.is_empty() {
                line.push_str(&format!(" [{}]", args.join(", ")));
            }
            if *stdin {
                line.push_str(" (stdin)");
            }
            if !*retries {
                line.push_str(" (no retry)");
            }
            line
        }
        PlannedAction::Upload { path, bytes, .. } => {
            format!("Upload {path} ({})", format_bytes(*bytes))
        }
    }
}

/// Size with a binary unit, one decimal above 1 KiB.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = KIB * 1024;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
