//! Published port extraction.

use std::collections::BTreeSet;

use ephemera_common::{ExposedPort, Protocol};

use super::{ComposeDocument, Node};
use crate::domain::error::ManifestError;

impl ComposeDocument {
    /// Every host port published by any service, deduplicated.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::InvalidPort`] for a malformed port entry.
    pub fn exposed_ports(&self) -> Result<BTreeSet<ExposedPort>, ManifestError> {
        let mut out = BTreeSet::new();
        for (service, node) in self.services() {
            let Some(ports) = node.get("ports") else {
                continue;
            };
            for entry in ports.one_or_many() {
                match entry {
                    Node::Scalar(spec) => out.extend(parse_short_form(service, spec)?),
                    Node::Mapping(_) => out.extend(parse_long_form(service, entry)?),
                    Node::Null | Node::Sequence(_) => {
                        return Err(ManifestError::UnexpectedShape {
                            path: format!("services.{service}.ports"),
                            expected: "a port string or a port mapping",
                        });
                    }
                }
            }
        }
        Ok(out)
    }
}

/// `[host_ip:]host[-host]:container[-container][/proto]`.
///
/// An empty host expression (`127.0.0.1::80`) publishes an ephemeral port
/// and yields nothing.
pub fn parse_short_form(service: &str, spec: &str) -> Result<Vec<ExposedPort>, ManifestError> {
    let invalid = |reason: &str| ManifestError::InvalidPort {
        service: service.to_string(),
        spec: spec.to_string(),
        reason: reason.to_string(),
    };

    let (body, protocol) = match spec.rsplit_once('/') {
        Some((body, proto)) => (
            body,
            proto
                .parse::<Protocol>()
                .map_err(|e| invalid(&e.to_string()))?,
        ),
        None => (spec, Protocol::Tcp),
    };

    let segments: Vec<&str> = body.split(':').collect();
    let host = match segments.as_slice() {
        [host] | [host, _] | [_, host, _] => *host,
        _ => return Err(invalid("expected at most three ':'-separated segments")),
    };

    expand_host_expression(host.trim(), protocol).map_err(|reason| invalid(&reason))
}

fn parse_long_form(service: &str, entry: &Node) -> Result<Vec<ExposedPort>, ManifestError> {
    let describe = || {
        entry
            .get("target")
            .and_then(Node::as_scalar)
            .map_or_else(|| "<long form>".to_string(), |t| format!("target {t}"))
    };
    let invalid = |reason: String| ManifestError::InvalidPort {
        service: service.to_string(),
        spec: describe(),
        reason,
    };

    let published = entry
        .get("published")
        .and_then(Node::as_scalar)
        .ok_or_else(|| invalid("long-form port is missing 'published'".to_string()))?;
    let protocol = match entry.get("protocol").and_then(Node::as_scalar) {
        Some(p) => p.parse::<Protocol>().map_err(|e| invalid(e.to_string()))?,
        None => Protocol::Tcp,
    };

    expand_host_expression(published.trim(), protocol).map_err(invalid)
}

fn expand_host_expression(expr: &str, protocol: Protocol) -> Result<Vec<ExposedPort>, String> {
    if expr.is_empty() {
        return Ok(Vec::new());
    }
    let (from, to) = match expr.split_once('-') {
        Some((a, b)) => (parse_port(a)?, parse_port(b)?),
        None => {
            let p = parse_port(expr)?;
            (p, p)
        }
    };
    if from > to {
        return Err(format!("range start {from} is greater than range end {to}"));
    }
    Ok((from..=to)
        .map(|port| ExposedPort { port, protocol })
        .collect())
}

fn parse_port(text: &str) -> Result<u16, String> {
    match text.trim().parse::<u16>() {
        Ok(0) => Err("port 0 is not a valid host port".to_string()),
        Ok(port) => Ok(port),
        Err(_) => Err(format!("'{text}' is not a port number")),
    }
}
