//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator at the CLI boundary.

use thiserror::Error;

// ── Command templating ────────────────────────────────────────────────────────

/// A command template could not be rendered. Always a defect in the caller,
/// never an operational failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SanitizationError {
    #[error("command template references undeclared argument '{0}'")]
    MissingArgument(String),

    #[error("invalid argument name '{0}': must match ^[A-Za-z_][A-Za-z0-9_]*$")]
    InvalidArgumentName(String),

    #[error("invalid build argument name '{0}'")]
    InvalidBuildArg(String),

    #[error("deployment path '{0}' must be relative and must not contain '..'")]
    UnsafePath(String),
}

// ── Manifest analysis ─────────────────────────────────────────────────────────

/// Errors raised while analyzing a Docker Compose manifest.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("compose manifest is not valid YAML: {0}")]
    Syntax(String),

    #[error("compose manifest: expected {expected} at {path}")]
    UnexpectedShape { path: String, expected: &'static str },

    #[error("service '{service}': invalid port '{spec}': {reason}")]
    InvalidPort {
        service: String,
        spec: String,
        reason: String,
    },

    #[error("invalid .dockerignore pattern '{pattern}': {reason}")]
    IgnorePattern { pattern: String, reason: String },
}

// ── Remote execution ──────────────────────────────────────────────────────────

/// Connection-level failure reported by an SSH transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Timeout, refused connection, or socket-level error. Worth retrying
    /// while the machine is still booting.
    #[error("host unreachable: {0}")]
    Unreachable(String),

    /// Authentication or configuration failure. Retrying will not help.
    #[error("connection rejected: {0}")]
    Rejected(String),
}

/// Errors surfaced by the remote execution client. Text fields are already
/// redacted.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Sanitization(#[from] SanitizationError),

    #[error("command blocked before execution: possible secret detected ({0})")]
    SecretDetected(String),

    #[error("command exited with code {exit_code}: {output}")]
    CommandFailed { exit_code: i32, output: String },

    #[error("could not connect to {host} within {waited_secs}s: {reason}")]
    ConnectTimeout {
        host: String,
        waited_secs: u64,
        reason: String,
    },

    #[error("connection to {host} rejected: {reason}")]
    ConnectRejected { host: String, reason: String },

    #[error("remote transport failed: {0}")]
    Transport(String),

    #[error("file transfer to {path} failed: {reason}")]
    TransferFailed { path: String, reason: String },
}

impl RemoteError {
    /// Whether a retry policy that allows retries should try again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CommandFailed { .. } | Self::Transport(_) | Self::TransferFailed { .. }
        )
    }
}

// ── Stages, flows, jobs ───────────────────────────────────────────────────────

/// A stage could not complete. Terminates the owning job as `Failed`.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage}: {message}")]
    Failed {
        stage: &'static str,
        message: String,
        /// Text safe to relay to the end user (e.g. the raw Compose error).
        client_payload: Option<String>,
    },

    #[error("{stage}: {source}")]
    Remote {
        stage: &'static str,
        #[source]
        source: RemoteError,
    },

    #[error("{stage}: {source}")]
    Manifest {
        stage: &'static str,
        #[source]
        source: ManifestError,
    },

    /// Cloud or persistence collaborator failure.
    #[error("{stage}: {source:#}")]
    Collaborator {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("{stage}: did not finish within {secs}s")]
    TimedOut { stage: &'static str, secs: u64 },

    #[error("stage contract violated: {0}")]
    Contract(String),
}

impl StageError {
    #[must_use]
    pub fn failed(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            stage,
            message: message.into(),
            client_payload: None,
        }
    }

    #[must_use]
    pub fn client_payload(&self) -> Option<&str> {
        match self {
            Self::Failed { client_payload, .. } => client_payload.as_deref(),
            _ => None,
        }
    }
}

/// Flow sequencing errors. Both variants are defects, not operational
/// failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error(
        "aggregate flow cursor is at {cursor}; the initial stage is only available before the first transition"
    )]
    InvalidState { cursor: usize },

    #[error("{flow} cannot sequence a {stage} stage")]
    UnexpectedStage {
        flow: &'static str,
        stage: &'static str,
    },

    #[error("{flow}: {stage} finished without producing its result")]
    MissingOutcome {
        flow: &'static str,
        stage: &'static str,
    },

    #[error("aggregate flow contains no flows")]
    Empty,
}

/// Why a job ended as `Failed`.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("superseded by a newer request")]
    Superseded,
}

impl JobError {
    /// Most specific client-facing text for this failure.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Stage(err) => err
                .client_payload()
                .map_or_else(|| err.to_string(), str::to_owned),
            other => other.to_string(),
        }
    }
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to engine configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}\n\n{reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}
