//! Regex-based implementation of the `SecretScanner` port.
//!
//! Only formats with a distinctive prefix are matched. Generic
//! `password=...` shapes are left alone: build arguments legitimately carry
//! them and are redacted from output anyway.

use std::sync::LazyLock;

use regex::Regex;

use crate::application::ports::SecretScanner;

struct SecretPattern {
    name: &'static str,
    regex: Regex,
}

impl SecretPattern {
    #[allow(clippy::expect_used)] // constant patterns, covered by tests
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("invalid secret pattern"),
        }
    }
}

static SECRET_PATTERNS: LazyLock<Vec<SecretPattern>> = LazyLock::new(|| {
    vec![
        SecretPattern::new("anthropic_api_key", r"sk-ant-[a-zA-Z0-9\-_]{20,}"),
        SecretPattern::new("openai_api_key", r"sk-[a-zA-Z0-9]{20,}"),
        SecretPattern::new("google_api_key", r"AIza[a-zA-Z0-9\-_]{35}"),
        SecretPattern::new("aws_access_key", r"AKIA[A-Z0-9]{16}"),
        SecretPattern::new(
            "aws_secret_key",
            r#"(?i)aws[_-]?secret[_-]?access[_-]?key['"]?\s*[:=]\s*['"]?[A-Za-z0-9/+=]{40}"#,
        ),
        SecretPattern::new(
            "private_key",
            r"-----BEGIN\s+(RSA\s+|EC\s+|DSA\s+|OPENSSH\s+)?PRIVATE\s+KEY-----",
        ),
        SecretPattern::new("github_token", r"gh[pousr]_[A-Za-z0-9_]{36,}"),
        SecretPattern::new(
            "slack_token",
            r"xox[baprs]-[0-9]{10,}-[0-9]{10,}-[a-zA-Z0-9]{24,}",
        ),
    ]
});

/// Matches well-known credential formats.
#[derive(Debug, Clone, Default)]
pub struct RegexSecretScanner;

impl RegexSecretScanner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SecretScanner for RegexSecretScanner {
    fn scan(&self, text: &str) -> Option<String> {
        SECRET_PATTERNS
            .iter()
            .find(|p| p.regex.is_match(text))
            .map(|p| p.name.to_string())
    }
}
