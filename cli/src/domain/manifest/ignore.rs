//! `.dockerignore` matching for build contexts.
//!
//! Patterns are globs relative to the context root. `*` and `?` stop at `/`,
//! `**` crosses directories, a leading `!` re-includes, and the last matching
//! pattern decides. A pattern that matches a directory covers everything
//! below it.

use regex::Regex;

use crate::domain::error::ManifestError;

#[derive(Debug)]
struct Rule {
    regex: Regex,
    include: bool,
}

/// Parsed `.dockerignore` file.
#[derive(Debug, Default)]
pub struct DockerIgnore {
    rules: Vec<Rule>,
}

impl DockerIgnore {
    /// # Errors
    ///
    /// [`ManifestError::IgnorePattern`] for a malformed glob.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let mut rules = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (include, pattern) = match line.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, line),
            };
            let pattern = pattern
                .trim_start_matches('/')
                .trim_start_matches("./")
                .trim_end_matches('/');
            if pattern.is_empty() || pattern == "." {
                continue;
            }
            let invalid = |reason: String| ManifestError::IgnorePattern {
                pattern: line.to_string(),
                reason,
            };
            let source = glob_to_regex(pattern).map_err(|r| invalid(r.to_string()))?;
            let regex = Regex::new(&source).map_err(|e| invalid(e.to_string()))?;
            rules.push(Rule { regex, include });
        }
        Ok(Self { rules })
    }

    /// Whether `path` (relative to the context root, `/`-separated) is left
    /// out of the build context.
    #[must_use]
    pub fn is_ignored(&self, path: &str) -> bool {
        let path = path.trim_start_matches("./");
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.regex.is_match(path))
            .is_some_and(|rule| !rule.include)
    }
}

fn glob_to_regex(pattern: &str) -> Result<String, &'static str> {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '\\' => {
                let escaped = chars.next().ok_or("trailing backslash")?;
                out.push_str(&regex::escape(&escaped.to_string()));
            }
            '[' => {
                out.push('[');
                if matches!(chars.peek(), Some('!' | '^')) {
                    chars.next();
                    out.push('^');
                }
                loop {
                    match chars.next().ok_or("unterminated character class")? {
                        ']' => break,
                        '\\' => {
                            let escaped = chars.next().ok_or("trailing backslash")?;
                            out.push_str(&regex::escape(&escaped.to_string()));
                        }
                        '[' => out.push_str("\\["),
                        other => out.push(other),
                    }
                }
                out.push(']');
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push_str("(?:/.*)?$");
    Ok(out)
}
