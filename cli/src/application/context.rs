//! Collaborators shared by every stage of every job.

use std::sync::Arc;

use crate::application::ports::{
    CloudCompute, InstanceStore, Notifier, SecretScanner, SshConnector,
};
use crate::application::remote::{RemoteClient, RemoteSettings};
use crate::domain::config::{DEFAULT_DEPLOYMENT_ROOT, EngineConfig};
use crate::domain::error::StageError;
use crate::domain::instance::InstanceRecord;

#[derive(Clone)]
pub struct StageContext {
    pub cloud: Arc<dyn CloudCompute>,
    pub store: Arc<dyn InstanceStore>,
    pub notifier: Arc<dyn Notifier>,
    pub connector: Arc<dyn SshConnector>,
    pub scanner: Arc<dyn SecretScanner>,
    pub remote: RemoteSettings,
    /// Remote directory that receives Compose projects.
    pub deployment_root: String,
}

impl StageContext {
    #[must_use]
    pub fn new(
        cloud: Arc<dyn CloudCompute>,
        store: Arc<dyn InstanceStore>,
        notifier: Arc<dyn Notifier>,
        connector: Arc<dyn SshConnector>,
        scanner: Arc<dyn SecretScanner>,
    ) -> Self {
        Self {
            cloud,
            store,
            notifier,
            connector,
            scanner,
            remote: RemoteSettings::default(),
            deployment_root: DEFAULT_DEPLOYMENT_ROOT.to_string(),
        }
    }

    /// Apply timing and path settings from `config`.
    #[must_use]
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.remote = RemoteSettings::from(config);
        self.deployment_root = config.deployment.root.trim_end_matches('/').to_string();
        self
    }

    pub(crate) async fn load_record(
        &self,
        stage: &'static str,
        instance_id: &str,
    ) -> Result<InstanceRecord, StageError> {
        self.store
            .load(instance_id)
            .await
            .map_err(|source| StageError::Collaborator { stage, source })?
            .ok_or_else(|| StageError::failed(stage, format!("instance record {instance_id} not found")))
    }

    pub(crate) async fn save_record(
        &self,
        stage: &'static str,
        record: &InstanceRecord,
    ) -> Result<(), StageError> {
        self.store
            .save(record)
            .await
            .map_err(|source| StageError::Collaborator { stage, source })
    }

    pub(crate) async fn connect(
        &self,
        stage: &'static str,
        host: &str,
    ) -> Result<RemoteClient, StageError> {
        RemoteClient::connect(
            self.connector.as_ref(),
            Arc::clone(&self.scanner),
            host,
            self.remote.clone(),
        )
        .await
        .map_err(|source| StageError::Remote { stage, source })
    }
}

impl std::fmt::Debug for StageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("remote", &self.remote)
            .field("deployment_root", &self.deployment_root)
            .finish_non_exhaustive()
    }
}
