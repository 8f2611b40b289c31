//! Engine configuration schema and validation.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.ephemera/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub ssh: SshConfig,
    pub retry: RetryConfig,
    pub scheduler: SchedulerConfig,
    pub deployment: DeploymentConfig,
}

/// How the engine reaches provisioned machines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SshConfig {
    pub user: String,
    pub port: u16,
    /// Private key passed to `ssh -i`. The agent is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<PathBuf>,
    /// Per-attempt TCP connect timeout.
    pub connect_timeout_secs: u64,
    /// Total time to keep retrying an unreachable host.
    pub connect_window_secs: u64,
    pub connect_interval_secs: u64,
    /// Upper bound for a single remote command.
    pub command_timeout_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: "ubuntu".to_string(),
            port: 22,
            identity_file: None,
            connect_timeout_secs: 10,
            connect_window_secs: 300,
            connect_interval_secs: 5,
            command_timeout_secs: 1800,
        }
    }
}

/// Retry vocabulary for commands run under `RetryPolicy::AllowRetries`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Backoff before attempt `n + 1` is `backoff_step_secs * n`.
    pub backoff_step_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_step_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub poll_interval_ms: u64,
    pub stage_timeout_secs: u64,
    /// Settled jobs kept for status queries before the oldest is dropped.
    pub retained_jobs: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            stage_timeout_secs: 1800,
            retained_jobs: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Remote directory that receives the Compose project.
    pub root: String,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_DEPLOYMENT_ROOT.to_string(),
        }
    }
}

pub const DEFAULT_DEPLOYMENT_ROOT: &str = "/opt/ephemera/deployment";

impl SshConfig {
    #[must_use]
    pub fn connect_window(&self) -> Duration {
        Duration::from_secs(self.connect_window_secs)
    }

    #[must_use]
    pub fn connect_interval(&self) -> Duration {
        Duration::from_secs(self.connect_interval_secs)
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl RetryConfig {
    #[must_use]
    pub fn backoff_step(&self) -> Duration {
        Duration::from_secs(self.backoff_step_secs)
    }
}

impl SchedulerConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

impl EngineConfig {
    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &'static str, value: String, reason: &'static str| {
            Err(ConfigError::InvalidValue { key, value, reason })
        };

        if self.ssh.user.trim().is_empty() {
            return invalid("ssh.user", self.ssh.user.clone(), "must not be empty");
        }
        if self.ssh.port == 0 {
            return invalid("ssh.port", "0".into(), "must be between 1 and 65535");
        }
        if self.ssh.connect_interval_secs == 0 {
            return invalid("ssh.connect_interval_secs", "0".into(), "must be at least 1");
        }
        if self.ssh.connect_interval_secs > self.ssh.connect_window_secs {
            return invalid(
                "ssh.connect_interval_secs",
                self.ssh.connect_interval_secs.to_string(),
                "must not exceed ssh.connect_window_secs",
            );
        }
        if self.ssh.command_timeout_secs == 0 {
            return invalid("ssh.command_timeout_secs", "0".into(), "must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts", "0".into(), "must be at least 1");
        }
        if self.scheduler.poll_interval_ms == 0 {
            return invalid("scheduler.poll_interval_ms", "0".into(), "must be at least 1");
        }
        if self.scheduler.stage_timeout_secs == 0 {
            return invalid("scheduler.stage_timeout_secs", "0".into(), "must be at least 1");
        }
        if self.scheduler.retained_jobs == 0 {
            return invalid("scheduler.retained_jobs", "0".into(), "must be at least 1");
        }
        let root = self.deployment.root.trim_end_matches('/');
        if !root.starts_with('/') || root.is_empty() || root.contains("..") {
            return invalid(
                "deployment.root",
                self.deployment.root.clone(),
                "must be an absolute path other than / without '..'",
            );
        }
        Ok(())
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
