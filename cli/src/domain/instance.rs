//! Instance, cloud operation and deployment payload types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag keys attached to every created instance.
pub const TAG_CLUSTER: &str = "ephemera:cluster";
pub const TAG_INSTANCE: &str = "ephemera:instance";
pub const TAG_PLAN: &str = "ephemera:plan";

/// A file to place in the remote deployment directory.
#[derive(Clone, PartialEq, Eq)]
pub struct InstanceDockerFile {
    /// Path relative to the deployment directory.
    pub path: String,
    pub contents: Vec<u8>,
}

impl InstanceDockerFile {
    #[must_use]
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

impl fmt::Debug for InstanceDockerFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceDockerFile")
            .field("path", &self.path)
            .field("len", &self.contents.len())
            .finish()
    }
}

/// Container registry login. `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredential {
    pub server: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredential")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Provisioning state of an instance record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    #[default]
    Provisioning,
    Ready,
    Failed,
}

/// The engine's persisted view of one instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceRecord {
    pub id: String,
    pub name: String,
    pub cluster_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub status: InstanceStatus,
}

impl InstanceRecord {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        cluster_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            cluster_id: cluster_id.into(),
            public_ip: None,
            status: InstanceStatus::Provisioning,
        }
    }
}

/// Lifecycle state reported by the cloud provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudInstanceState {
    Pending,
    Running,
    Stopped,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudInstance {
    pub name: String,
    pub state: CloudInstanceState,
    pub public_ip: Option<String>,
}

/// Handle of an asynchronous cloud operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationId(pub String);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    NotStarted,
    Started,
    Succeeded,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInstanceRequest {
    pub name: String,
    pub plan_id: String,
    pub tags: BTreeMap<String, String>,
}

impl CreateInstanceRequest {
    /// Request for `record` on `plan_id`, carrying the three required tags.
    #[must_use]
    pub fn for_record(record: &InstanceRecord, plan_id: &str) -> Self {
        let tags = BTreeMap::from([
            (TAG_CLUSTER.to_string(), record.cluster_id.clone()),
            (TAG_INSTANCE.to_string(), record.id.clone()),
            (TAG_PLAN.to_string(), plan_id.to_string()),
        ]);
        Self {
            name: record.name.clone(),
            plan_id: plan_id.to_string(),
            tags,
        }
    }
}

/// Network identity of an instance once `CreateInstance` succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedInstance {
    pub instance_id: String,
    pub name: String,
    pub public_ip: String,
}
