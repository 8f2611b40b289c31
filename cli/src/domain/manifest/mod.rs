//! Docker Compose manifest analysis.
//!
//! The YAML document is normalized into a small [`Node`] tree first, so that
//! fields which Compose allows in several shapes (a scalar, a list, or a
//! mapping) can be queried the same way. Queries live in [`ports`] and
//! [`files`]; [`ignore`] filters build contexts.

use std::collections::BTreeSet;

use ephemera_common::{ExposedPortRange, collapse_ranges};
use serde::Serialize;
use serde_yaml::Value;

use crate::domain::error::ManifestError;

pub mod files;
pub mod ignore;
pub mod ports;

/// Normalized YAML node. Scalars of any type are kept as their string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Null,
    Scalar(String),
    Sequence(Vec<Node>),
    Mapping(Vec<(String, Node)>),
}

impl Node {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Scalar(b.to_string()),
            Value::Number(n) => Self::Scalar(n.to_string()),
            Value::String(s) => Self::Scalar(s),
            Value::Sequence(items) => Self::Sequence(items.into_iter().map(Self::from_value).collect()),
            Value::Mapping(map) => Self::Mapping(
                map.into_iter()
                    .filter_map(|(k, v)| scalar_key(k).map(|k| (k, Self::from_value(v))))
                    .collect(),
            ),
            Value::Tagged(tagged) => Self::from_value(tagged.value),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Self::Mapping(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// `null` is empty, a sequence yields its items, anything else yields itself.
    #[must_use]
    pub fn one_or_many(&self) -> Vec<&Node> {
        match self {
            Self::Null => Vec::new(),
            Self::Sequence(items) => items.iter().collect(),
            other => vec![other],
        }
    }
}

fn scalar_key(key: Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A parsed Compose file.
#[derive(Debug, Clone)]
pub struct ComposeDocument {
    services: Vec<(String, Node)>,
    named_volumes: BTreeSet<String>,
}

impl ComposeDocument {
    /// Parse Compose YAML.
    ///
    /// # Errors
    ///
    /// [`ManifestError::Syntax`] for malformed YAML and
    /// [`ManifestError::UnexpectedShape`] when `services` or `volumes` are not
    /// mappings.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let value: Value =
            serde_yaml::from_str(text).map_err(|e| ManifestError::Syntax(e.to_string()))?;
        let root = Node::from_value(value);

        let root_entries: &[(String, Node)] = match &root {
            Node::Null => &[],
            Node::Mapping(entries) => entries,
            other => {
                return Err(ManifestError::UnexpectedShape {
                    path: "<root>".to_string(),
                    expected: expect_mapping(other),
                });
            }
        };
        let field = |key: &str| {
            root_entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v)
        };

        let services = match field("services") {
            None | Some(Node::Null) => Vec::new(),
            Some(Node::Mapping(entries)) => entries.clone(),
            Some(other) => {
                return Err(ManifestError::UnexpectedShape {
                    path: "services".to_string(),
                    expected: expect_mapping(other),
                });
            }
        };

        let named_volumes = match field("volumes") {
            None | Some(Node::Null) => BTreeSet::new(),
            Some(Node::Mapping(entries)) => entries.iter().map(|(k, _)| k.clone()).collect(),
            Some(other) => {
                return Err(ManifestError::UnexpectedShape {
                    path: "volumes".to_string(),
                    expected: expect_mapping(other),
                });
            }
        };

        Ok(Self {
            services,
            named_volumes,
        })
    }

    /// Service names in document order.
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(|(name, _)| name.as_str())
    }

    pub(crate) fn services(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.services.iter().map(|(name, node)| (name.as_str(), node))
    }

    pub(crate) fn is_named_volume(&self, name: &str) -> bool {
        self.named_volumes.contains(name)
    }

    /// Union of env files, Dockerfiles and bind-mount sources.
    ///
    /// # Errors
    ///
    /// Propagates shape errors from the individual queries.
    pub fn required_files(&self) -> Result<BTreeSet<String>, ManifestError> {
        let mut out = self.env_files()?;
        out.extend(self.dockerfile_paths()?);
        out.extend(self.bind_mount_paths()?);
        Ok(out)
    }

    /// Every query at once, ports collapsed into ranges.
    ///
    /// # Errors
    ///
    /// The first error any query reports.
    pub fn summarize(&self) -> Result<ManifestSummary, ManifestError> {
        Ok(ManifestSummary {
            services: self.service_names().map(str::to_string).collect(),
            ports: collapse_ranges(&self.exposed_ports()?),
            env_files: self.env_files()?.into_iter().collect(),
            bind_mounts: self.bind_mount_paths()?.into_iter().collect(),
            dockerfiles: self.dockerfile_paths()?.into_iter().collect(),
        })
    }
}

/// Result of analyzing one Compose file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestSummary {
    pub services: Vec<String>,
    pub ports: Vec<ExposedPortRange>,
    pub env_files: Vec<String>,
    pub bind_mounts: Vec<String>,
    pub dockerfiles: Vec<String>,
}

fn expect_mapping(found: &Node) -> &'static str {
    match found {
        Node::Scalar(_) => "a mapping, found a scalar",
        Node::Sequence(_) => "a mapping, found a sequence",
        Node::Null | Node::Mapping(_) => "a mapping",
    }
}
