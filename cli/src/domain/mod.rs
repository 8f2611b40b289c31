//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod command;
pub mod config;
pub mod error;
pub mod instance;
pub mod job;
pub mod manifest;
pub mod queue;

pub use command::{CommandTemplate, RenderedCommand, RetryPolicy, Sensitivity};
pub use config::EngineConfig;
pub use error::{
    ConfigError, FlowError, JobError, ManifestError, RemoteError, SanitizationError, StageError,
    TransportError,
};
pub use instance::{InstanceDockerFile, InstanceRecord, RegistryCredential};
pub use job::JobId;
pub use manifest::ignore::DockerIgnore;
pub use manifest::{ComposeDocument, ManifestSummary};
pub use queue::BoundedCoalescingQueue;
