//! Command implementations

pub mod analyze;
pub mod exec;
pub mod plan;
pub mod version;

use crate::domain::instance::RegistryCredential;

/// Parse `KEY=VALUE`. The value may itself contain `=`.
///
/// # Errors
///
/// Returns a message for clap when `=` is missing or the key is empty.
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Parse `SERVER=USER:PASSWORD`. The password may contain `:`.
///
/// # Errors
///
/// Returns a message for clap when any part is missing.
pub fn parse_registry(raw: &str) -> Result<RegistryCredential, String> {
    let invalid = || "expected SERVER=USER:PASSWORD".to_string();
    let (server, credentials) = raw.split_once('=').ok_or_else(invalid)?;
    let (username, password) = credentials.split_once(':').ok_or_else(invalid)?;
    if server.is_empty() || username.is_empty() || password.is_empty() {
        return Err(invalid());
    }
    Ok(RegistryCredential {
        server: server.to_string(),
        username: username.to_string(),
        password: password.to_string(),
    })
}
