//! Application context: the state passed to every command handler.
//!
//! `AppContext` owns the output context, the loaded engine configuration and
//! the infrastructure adapters commands need, so command signatures stay
//! `fn run(app: &AppContext, ..)`.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::application::ports::{ConfigStore, SecretScanner};
use crate::application::remote::RemoteSettings;
use crate::domain::config::EngineConfig;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlConfigStore;
use crate::infra::secrets::RegexSecretScanner;
use crate::infra::source::LocalDirSource;
use crate::infra::ssh::{OpenSshConnector, OpenSshOptions};
use crate::output::{HumanRenderer, OutputContext, Renderer, TerminalReporter};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags passed from the top-level CLI.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Engine configuration, validated.
    pub config: EngineConfig,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but is invalid.
    pub fn new(flags: &OutputFlags) -> Result<Self> {
        Self::with_store(flags, &YamlConfigStore::new())
    }

    /// Like [`AppContext::new`] reading configuration from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails to load.
    pub fn with_store(flags: &OutputFlags, store: &dyn ConfigStore) -> Result<Self> {
        let mode = if flags.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        // Progress lines would interleave with the JSON document on stdout.
        let quiet = flags.quiet || flags.json;

        Ok(Self {
            output: OutputContext::new(flags.no_color, quiet),
            mode,
            config: store.load()?,
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json,
        }
    }

    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// OpenSSH transport configured from `config.ssh`.
    #[must_use]
    pub fn ssh_connector(&self) -> OpenSshConnector<TokioCommandRunner> {
        OpenSshConnector::new(
            Arc::new(TokioCommandRunner::new()),
            OpenSshOptions::from(&self.config.ssh),
        )
    }

    /// Files of the Compose project rooted at `dir`.
    #[must_use]
    pub fn project_source(&self, dir: &Path) -> LocalDirSource {
        LocalDirSource::new(dir)
    }

    #[must_use]
    pub fn secret_scanner(&self) -> Arc<dyn SecretScanner> {
        Arc::new(RegexSecretScanner::new())
    }

    #[must_use]
    pub fn remote_settings(&self) -> RemoteSettings {
        RemoteSettings::from(&self.config)
    }
}
