//! Job status as exposed to pollers (e.g. an HTTP status endpoint).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse status of a scheduled provisioning job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// `Succeeded` and `Failed` are final; a job never leaves them.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobSnapshot {
    pub id: String,
    pub status: JobStatus,
    /// Mirrors the description of the active stage.
    pub description: String,
    /// Most specific client-facing failure text, set only when `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}
