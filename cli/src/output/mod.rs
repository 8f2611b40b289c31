//! Output formatting module

pub mod human;
pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use anyhow::Result;
use console::Term;
use owo_colors::OwoColorize as _;

pub use human::HumanRenderer;
pub use json::JsonRenderer;
pub use reporter::TerminalReporter;
pub use styles::Styles;

use crate::application::blueprint::Blueprint;
use crate::domain::manifest::ManifestSummary;

/// Output context carrying styling and terminal state.
pub struct OutputContext {
    /// Stylesheet for colored output.
    pub styles: Styles,
    /// Whether stdout is a TTY.
    pub is_tty: bool,
    /// Whether to suppress non-error output.
    pub quiet: bool,
}

impl OutputContext {
    /// Create output context based on CLI flags and environment.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let use_colors = !no_color && is_tty && std::env::var("NO_COLOR").is_err();

        let mut styles = Styles::default();
        if use_colors {
            styles.colorize();
        }

        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    /// Check if progress indicators should be shown.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet
    }

    fn mark(&self, glyph: &str, style: owo_colors::Style, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", glyph.style(style));
        }
    }

    /// `✓ msg`, suppressed when `quiet`.
    pub fn success(&self, msg: &str) {
        self.mark("✓", self.styles.success, msg);
    }

    /// `⚠ msg`, suppressed when `quiet`.
    pub fn warn(&self, msg: &str) {
        self.mark("⚠", self.styles.warning, msg);
    }

    /// `✗ msg` on stderr. Never suppressed.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.error));
    }

    pub fn info(&self, msg: &str) {
        self.mark("ℹ", self.styles.info, msg);
    }

    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.header));
        }
    }

    /// Key (dimmed) and value on one line.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.dim));
        }
    }
}

/// Dispatches command results to the renderer for the active output mode.
pub enum Renderer<'a> {
    Human(HumanRenderer<'a>),
    Json,
}

// Every render method returns an error only when JSON serialization fails.
#[allow(clippy::missing_errors_doc)]
impl Renderer<'_> {
    fn dispatch(
        &self,
        human: impl FnOnce(&HumanRenderer<'_>),
        json: impl FnOnce() -> Result<()>,
    ) -> Result<()> {
        match self {
            Self::Human(r) => {
                human(r);
                Ok(())
            }
            Self::Json => json(),
        }
    }

    pub fn render_version(&self, version: &str) -> Result<()> {
        self.dispatch(
            |r| r.render_version(version),
            || JsonRenderer::render_version(version),
        )
    }

    pub fn render_analysis(&self, file: &str, summary: &ManifestSummary) -> Result<()> {
        self.dispatch(
            |r| r.render_analysis(file, summary),
            || JsonRenderer::render_analysis(file, summary),
        )
    }

    pub fn render_blueprint(&self, blueprint: &Blueprint) -> Result<()> {
        self.dispatch(
            |r| r.render_blueprint(blueprint),
            || JsonRenderer::render_blueprint(blueprint),
        )
    }

    pub fn render_exec(&self, host: &str, stdout: &str) -> Result<()> {
        self.dispatch(|r| r.render_exec(stdout), || JsonRenderer::render_exec(host, stdout))
    }
}
