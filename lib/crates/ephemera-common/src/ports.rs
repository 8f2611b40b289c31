//! Firewall-facing port types shared between the engine and its callers.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport protocol of an exposed port.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported protocol '{0}' (expected tcp or udp)")]
pub struct ParseProtocolError(pub String);

impl FromStr for Protocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(ParseProtocolError(other.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("tcp"),
            Self::Udp => f.write_str("udp"),
        }
    }
}

/// A single host port published by a workload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExposedPort {
    pub port: u16,
    pub protocol: Protocol,
}

impl ExposedPort {
    /// Administrative SSH port, always open on provisioned instances.
    pub const SSH: Self = Self::tcp(22);

    #[must_use]
    pub const fn tcp(port: u16) -> Self {
        Self {
            port,
            protocol: Protocol::Tcp,
        }
    }

    #[must_use]
    pub const fn udp(port: u16) -> Self {
        Self {
            port,
            protocol: Protocol::Udp,
        }
    }
}

impl fmt::Display for ExposedPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

/// An inclusive range of host ports sharing one protocol.
///
/// A single [`ExposedPort`] is the range where `from_port == to_port`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ExposedPortRange {
    pub from_port: u16,
    pub to_port: u16,
    pub protocol: Protocol,
}

impl ExposedPortRange {
    #[must_use]
    pub fn contains(&self, port: ExposedPort) -> bool {
        port.protocol == self.protocol && (self.from_port..=self.to_port).contains(&port.port)
    }

    /// Expand back into individual ports.
    pub fn ports(&self) -> impl Iterator<Item = ExposedPort> + '_ {
        (self.from_port..=self.to_port).map(|port| ExposedPort {
            port,
            protocol: self.protocol,
        })
    }
}

impl From<ExposedPort> for ExposedPortRange {
    fn from(p: ExposedPort) -> Self {
        Self {
            from_port: p.port,
            to_port: p.port,
            protocol: p.protocol,
        }
    }
}

impl fmt::Display for ExposedPortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from_port == self.to_port {
            write!(f, "{}/{}", self.from_port, self.protocol)
        } else {
            write!(f, "{}-{}/{}", self.from_port, self.to_port, self.protocol)
        }
    }
}

/// Collapse a port set into the fewest contiguous ranges per protocol.
///
/// Firewall APIs are billed/limited per rule, so `9000,9001,9002/tcp`
/// becomes one `9000-9002/tcp` rule.
#[must_use]
pub fn collapse_ranges(ports: &BTreeSet<ExposedPort>) -> Vec<ExposedPortRange> {
    let mut sorted: Vec<ExposedPort> = ports.iter().copied().collect();
    sorted.sort_by_key(|p| (p.protocol, p.port));

    let mut out: Vec<ExposedPortRange> = Vec::new();
    for p in sorted {
        match out.last_mut() {
            Some(last) if last.protocol == p.protocol && u32::from(last.to_port) + 1 == u32::from(p.port) => {
                last.to_port = p.port;
            }
            _ => out.push(p.into()),
        }
    }
    out
}
