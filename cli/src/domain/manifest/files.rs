//! File dependencies of a Compose project: env files, bind mounts, Dockerfiles
//! and build contexts.

use std::collections::BTreeSet;

use super::{ComposeDocument, Node};
use crate::domain::error::ManifestError;

impl ComposeDocument {
    /// `env_file` as a string, a list of strings, or a list of `{path: ...}`.
    ///
    /// # Errors
    ///
    /// [`ManifestError::UnexpectedShape`] for any other shape.
    pub fn env_files(&self) -> Result<BTreeSet<String>, ManifestError> {
        let mut out = BTreeSet::new();
        for (service, node) in self.services() {
            let Some(env_file) = node.get("env_file") else {
                continue;
            };
            for entry in env_file.one_or_many() {
                let path = entry
                    .as_scalar()
                    .or_else(|| entry.get("path").and_then(Node::as_scalar))
                    .ok_or_else(|| ManifestError::UnexpectedShape {
                        path: format!("services.{service}.env_file"),
                        expected: "a path or a list of paths",
                    })?;
                out.insert(path.to_string());
            }
        }
        Ok(out)
    }

    /// Host sources of bind mounts. Top-level named volumes are excluded.
    ///
    /// # Errors
    ///
    /// [`ManifestError::UnexpectedShape`] for a volume entry that is neither a
    /// string nor a mapping.
    pub fn bind_mount_paths(&self) -> Result<BTreeSet<String>, ManifestError> {
        let mut out = BTreeSet::new();
        for (service, node) in self.services() {
            let Some(volumes) = node.get("volumes") else {
                continue;
            };
            for entry in volumes.one_or_many() {
                match entry {
                    Node::Scalar(spec) => {
                        // A lone target is an anonymous volume.
                        if let Some((source, _)) = spec.split_once(':')
                            && !source.is_empty()
                            && !self.is_named_volume(source)
                        {
                            out.insert(source.to_string());
                        }
                    }
                    Node::Mapping(_) => {
                        let is_bind = entry.get("type").and_then(Node::as_scalar) == Some("bind");
                        if let Some(source) = entry.get("source").and_then(Node::as_scalar)
                            && is_bind
                        {
                            out.insert(source.to_string());
                        }
                    }
                    Node::Null | Node::Sequence(_) => {
                        return Err(ManifestError::UnexpectedShape {
                            path: format!("services.{service}.volumes"),
                            expected: "a volume string or a volume mapping",
                        });
                    }
                }
            }
        }
        Ok(out)
    }

    /// Dockerfile of every locally built service, resolved against its build
    /// context: `build: <ctx>` yields `<ctx>/Dockerfile`, the object form
    /// joins `dockerfile` (default `Dockerfile`) onto `context` (default `.`).
    ///
    /// # Errors
    ///
    /// [`ManifestError::UnexpectedShape`] when `build` is a list.
    pub fn dockerfile_paths(&self) -> Result<BTreeSet<String>, ManifestError> {
        Ok(self
            .builds()?
            .into_iter()
            .map(|build| join_context(build.context, build.dockerfile))
            .collect())
    }

    /// Local build contexts. Remote contexts (git or HTTP URLs) are fetched
    /// by the builder itself and are left out.
    ///
    /// # Errors
    ///
    /// [`ManifestError::UnexpectedShape`] when `build` is a list.
    pub fn build_contexts(&self) -> Result<BTreeSet<String>, ManifestError> {
        Ok(self
            .builds()?
            .into_iter()
            .map(|build| build.context.to_string())
            .collect())
    }

    fn builds(&self) -> Result<Vec<Build<'_>>, ManifestError> {
        let mut out = Vec::new();
        for (service, node) in self.services() {
            let build = match node.get("build") {
                None | Some(Node::Null) => continue,
                Some(Node::Scalar(context)) => Build {
                    context,
                    dockerfile: "Dockerfile",
                },
                Some(build @ Node::Mapping(_)) => Build {
                    context: build.get("context").and_then(Node::as_scalar).unwrap_or("."),
                    dockerfile: build
                        .get("dockerfile")
                        .and_then(Node::as_scalar)
                        .unwrap_or("Dockerfile"),
                },
                Some(Node::Sequence(_)) => {
                    return Err(ManifestError::UnexpectedShape {
                        path: format!("services.{service}.build"),
                        expected: "a build context or a build mapping",
                    });
                }
            };
            if !is_remote_context(build.context) {
                out.push(build);
            }
        }
        Ok(out)
    }
}

struct Build<'a> {
    context: &'a str,
    dockerfile: &'a str,
}

fn is_remote_context(context: &str) -> bool {
    context.contains("://") || context.starts_with("git@")
}

fn join_context(context: &str, dockerfile: &str) -> String {
    let context = context.trim_end_matches('/');
    if dockerfile.starts_with('/') || context.is_empty() || context == "." {
        dockerfile.to_string()
    } else {
        format!("{context}/{dockerfile}")
    }
}
