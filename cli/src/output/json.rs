//! JSON output helpers.
//!
//! Provides the machine-readable renderer and the error-object formatter used
//! by all `--json` code paths when a command fails.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::application::blueprint::Blueprint;
use crate::domain::error::{ConfigError, ManifestError, RemoteError, SanitizationError};
use crate::domain::manifest::ManifestSummary;

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Stable error code for the most specific domain error in `err`'s chain.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    err.chain()
        .find_map(|cause| {
            if cause.is::<SanitizationError>() {
                Some("SANITIZATION_ERROR")
            } else if let Some(remote) = cause.downcast_ref::<RemoteError>() {
                Some(match remote {
                    RemoteError::Sanitization(_) => "SANITIZATION_ERROR",
                    RemoteError::SecretDetected(_) => "SECRET_DETECTED",
                    RemoteError::CommandFailed { .. } => "COMMAND_FAILED",
                    RemoteError::ConnectTimeout { .. } | RemoteError::ConnectRejected { .. } => {
                        "CONNECT_FAILED"
                    }
                    RemoteError::Transport(_) | RemoteError::TransferFailed { .. } => {
                        "TRANSPORT_ERROR"
                    }
                })
            } else if cause.is::<ManifestError>() {
                Some("MANIFEST_ERROR")
            } else if cause.is::<ConfigError>() {
                Some("CONFIG_ERROR")
            } else {
                None
            }
        })
        .unwrap_or("ERROR")
}

#[derive(Serialize)]
struct Analysis<'a> {
    file: &'a str,
    #[serde(flatten)]
    summary: &'a ManifestSummary,
}

/// Renders command results as pretty-printed JSON on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_version(version: &str) -> Result<()> {
        print_json(&serde_json::json!({ "version": version }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_analysis(file: &str, summary: &ManifestSummary) -> Result<()> {
        print_json(&Analysis { file, summary })
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_blueprint(blueprint: &Blueprint) -> Result<()> {
        print_json(blueprint)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_exec(host: &str, stdout: &str) -> Result<()> {
        print_json(&serde_json::json!({ "host": host, "stdout": stdout }))
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
    println!("{out}");
    Ok(())
}
