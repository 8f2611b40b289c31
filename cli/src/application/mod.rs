//! Application layer: port trait definitions and use-case orchestration.
//!
//! This module depends only on `crate::domain` and never on `crate::infra`,
//! `crate::commands`, or `crate::output`.

pub mod blueprint;
pub mod context;
pub mod exec;
pub mod flow;
pub mod ports;
pub mod remote;
pub mod scheduler;
pub mod stage;

pub use context::StageContext;
pub use flow::{AggregateFlow, ComposeDeployFlow, Flow, InstanceProvisionFlow};
pub use ports::{
    CloudCompute, CommandOutput, CommandRunner, ConfigStore, FileSource, InstanceStore, Notifier,
    ProgressReporter, SecretScanner, SshConnector, SshSession,
};
pub use remote::{RemoteClient, RemoteSettings};
pub use scheduler::JobScheduler;
pub use stage::{Stage, StageStatus};
