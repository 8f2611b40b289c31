//! Deployment of a Compose project as a single-stage flow.

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

use super::Flow;
use crate::application::context::StageContext;
use crate::application::ports::FileSource;
use crate::application::stage::{DeployCompose, DeploySpec, Phase, Stage};
use crate::domain::error::FlowError;
use crate::domain::instance::{InstanceDockerFile, RegistryCredential};
use crate::domain::manifest::ComposeDocument;
use crate::domain::manifest::ignore::DockerIgnore;

/// A single `DeployCompose` stage.
#[derive(Debug, Clone)]
pub struct ComposeDeployFlow {
    instance_id: String,
    spec: DeploySpec,
}

impl ComposeDeployFlow {
    pub const NAME: &'static str = "ComposeDeployFlow";

    #[must_use]
    pub fn new(instance_id: impl Into<String>, spec: DeploySpec) -> Self {
        Self {
            instance_id: instance_id.into(),
            spec,
        }
    }

    /// Build the deployment from a local project: read each compose file,
    /// every file the manifests depend on, and every local build context
    /// minus what its `.dockerignore` excludes.
    ///
    /// Absolute and home-relative paths refer to the target machine and are
    /// not uploaded.
    ///
    /// # Errors
    ///
    /// Fails when a compose file is missing or unparseable, or when a
    /// required project file or build context cannot be read.
    pub async fn from_sources(
        source: &dyn FileSource,
        instance_id: impl Into<String>,
        compose_files: Vec<String>,
        build_args: Vec<(String, String)>,
        registries: Vec<RegistryCredential>,
    ) -> Result<Self> {
        if compose_files.is_empty() {
            bail!("at least one compose file is required");
        }
        let mut files: BTreeMap<String, InstanceDockerFile> = BTreeMap::new();

        for compose_file in &compose_files {
            let manifest = read_single(source, compose_file).await?;
            let text = std::str::from_utf8(&manifest.contents)
                .with_context(|| format!("{compose_file} is not valid UTF-8"))?;
            let document = ComposeDocument::parse(text)
                .with_context(|| format!("failed to analyze {compose_file}"))?;
            let base = compose_file.rsplit_once('/').map(|(dir, _)| dir);
            let analyze = || format!("failed to analyze {compose_file}");

            for required in document.required_files().with_context(analyze)? {
                if is_remote_path(&required) {
                    continue;
                }
                let path = project_path(base, &required);
                for file in source
                    .read(&path)
                    .await
                    .with_context(|| format!("{compose_file} requires {path}"))?
                {
                    files.entry(file.path.clone()).or_insert(file);
                }
            }

            for context in document.build_contexts().with_context(analyze)? {
                if is_remote_path(&context) {
                    continue;
                }
                let dir = project_path(base, &context);
                let context_files = source
                    .read(&dir)
                    .await
                    .with_context(|| format!("{compose_file} builds from {dir}"))?;
                for file in without_ignored(&dir, context_files)? {
                    files.entry(file.path.clone()).or_insert(file);
                }
            }
            files.insert(manifest.path.clone(), manifest);
        }

        debug!(files = files.len(), "collected deployment files");
        Ok(Self::new(
            instance_id,
            DeploySpec {
                compose_files,
                files: files.into_values().collect(),
                build_args,
                registries,
            },
        ))
    }

    #[must_use]
    pub fn spec(&self) -> &DeploySpec {
        &self.spec
    }
}

fn is_remote_path(path: &str) -> bool {
    let remote = path.starts_with('/') || path.starts_with('~');
    if remote {
        warn!(path, "skipping path outside the project");
    }
    remote
}

/// `path` joined onto the compose file's directory, with `.` segments
/// dropped. The project root is `.`.
fn project_path(base: Option<&str>, path: &str) -> String {
    let joined: Vec<&str> = base
        .into_iter()
        .flat_map(|dir| dir.split('/'))
        .chain(path.split('/'))
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();
    if joined.is_empty() {
        ".".to_string()
    } else {
        joined.join("/")
    }
}

/// Drop the files a context's `.dockerignore` excludes.
fn without_ignored(
    dir: &str,
    files: Vec<InstanceDockerFile>,
) -> Result<Vec<InstanceDockerFile>> {
    let prefix = if dir == "." { String::new() } else { format!("{dir}/") };
    let ignore_path = format!("{prefix}.dockerignore");
    let ignore = match files.iter().find(|f| f.path == ignore_path) {
        Some(file) => {
            let text = std::str::from_utf8(&file.contents)
                .with_context(|| format!("{ignore_path} is not valid UTF-8"))?;
            DockerIgnore::parse(text).with_context(|| format!("failed to parse {ignore_path}"))?
        }
        None => DockerIgnore::default(),
    };
    Ok(files
        .into_iter()
        .filter(|file| {
            let relative = file.path.strip_prefix(&prefix).unwrap_or(&file.path);
            !ignore.is_ignored(relative)
        })
        .collect())
}

async fn read_single(source: &dyn FileSource, path: &str) -> Result<InstanceDockerFile> {
    let mut files = source
        .read(path)
        .await
        .with_context(|| format!("failed to read compose file {path}"))?;
    match (files.pop(), files.is_empty()) {
        (Some(file), true) => Ok(file),
        _ => bail!("{path} is not a regular file"),
    }
}

impl Flow for ComposeDeployFlow {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initial_stage(&self, ctx: &StageContext) -> Result<Stage, FlowError> {
        Ok(DeployCompose::new(&self.instance_id, self.spec.clone(), &ctx.deployment_root).into())
    }

    fn next_stage(
        &self,
        _ctx: &StageContext,
        current: &Stage,
    ) -> Result<Option<Stage>, FlowError> {
        match current.phase() {
            Phase::DeployCompose(_) => Ok(None),
            Phase::CreateInstance(_) | Phase::InstallSoftware(_) | Phase::CompleteSetup(_) => {
                Err(FlowError::UnexpectedStage {
                    flow: Self::NAME,
                    stage: current.name(),
                })
            }
        }
    }
}
