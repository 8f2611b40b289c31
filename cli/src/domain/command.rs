//! Typed command templates for remote execution.
//!
//! A template references named arguments with `@name` (value is shell-quoted)
//! or `@@name` (value is inserted verbatim, for trusted fragments only).
//! Rendering is a single left-to-right pass, so a value that itself contains
//! `@other` is never expanded again.

use std::fmt;

use crate::domain::error::SanitizationError;

/// Replacement text for argument values in logs and error output.
pub const REDACTION_MASK: &str = "***";

/// Whether a failed command may be re-run by the remote client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    AllowRetries,
    ProhibitRetries,
}

/// Whether command output may be written to logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensitivity {
    MayContainSensitiveData,
    ContainsNoSensitiveData,
}

/// A command string plus the named values it references.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    template: String,
    args: Vec<(String, String)>,
}

impl fmt::Debug for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTemplate")
            .field("template", &self.template)
            .field("args", &self.arg_names().collect::<Vec<_>>())
            .finish()
    }
}

impl CommandTemplate {
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            args: Vec::new(),
        }
    }

    /// Declare the value for placeholder `name`. A later declaration of the
    /// same name wins.
    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.args.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.args.push((name, value));
        }
        self
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Declared argument names in declaration order.
    pub fn arg_names(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(|(n, _)| n.as_str())
    }

    fn value(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Substitute every placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`SanitizationError::InvalidArgumentName`] if a declared name is
    /// not an identifier, or [`SanitizationError::MissingArgument`] if the
    /// template references a name that was never declared.
    pub fn render(&self) -> Result<RenderedCommand, SanitizationError> {
        if let Some((name, _)) = self.args.iter().find(|(n, _)| !is_identifier(n)) {
            return Err(SanitizationError::InvalidArgumentName(name.clone()));
        }

        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        while let Some(at) = rest.find('@') {
            out.push_str(&rest[..at]);
            let after = &rest[at + 1..];
            let (raw, body) = match after.strip_prefix('@') {
                Some(body) => (true, body),
                None => (false, after),
            };
            let ident_len = identifier_len(body);
            if ident_len == 0 {
                // Not a placeholder: keep the '@' and continue after it.
                out.push('@');
                rest = after;
                continue;
            }
            let name = &body[..ident_len];
            let value = self
                .value(name)
                .ok_or_else(|| SanitizationError::MissingArgument(name.to_string()))?;
            if raw {
                out.push_str(value);
            } else {
                out.push_str(&shell_quote(value));
            }
            rest = &body[ident_len..];
        }
        out.push_str(rest);

        let mut secrets: Vec<String> = self
            .args
            .iter()
            .map(|(_, v)| v.clone())
            .filter(|v| !v.is_empty())
            .collect();
        // Longest first so a value that contains another is masked whole.
        secrets.sort_by_key(|v| std::cmp::Reverse(v.len()));
        secrets.dedup();

        Ok(RenderedCommand { text: out, secrets })
    }
}

/// A fully substituted command. `Display` shows the redacted form.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedCommand {
    text: String,
    secrets: Vec<String>,
}

impl RenderedCommand {
    /// Text to hand to the shell. Never log this.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Replace every argument value in `text` with [`REDACTION_MASK`].
    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        redact(text, &self.secrets)
    }

    #[must_use]
    pub fn secrets(&self) -> &[String] {
        &self.secrets
    }
}

impl fmt::Display for RenderedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redact(&self.text))
    }
}

impl fmt::Debug for RenderedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RenderedCommand")
            .field(&self.to_string())
            .finish()
    }
}

/// Literal substring replacement of each non-empty secret.
#[must_use]
pub fn redact<S: AsRef<str>>(text: &str, secrets: &[S]) -> String {
    let mut out = text.to_string();
    for secret in secrets {
        let secret = secret.as_ref();
        if !secret.is_empty() {
            out = out.replace(secret, REDACTION_MASK);
        }
    }
    out
}

/// POSIX single-quote `value`: `it's` becomes `'it'\''s'`.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn identifier_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map_or(s.len(), |(i, _)| i)
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && identifier_len(name) == name.len()
}
