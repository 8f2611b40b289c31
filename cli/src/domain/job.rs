//! Job identity.

use std::fmt;

/// Opaque job identifier: `job-` followed by 16 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh identifier from wall-clock time and process entropy.
    #[must_use]
    pub fn generate() -> Self {
        use std::collections::hash_map::RandomState;
        use std::hash::{BuildHasher, Hasher};
        use std::sync::atomic::{AtomicU64, Ordering};

        static SEQUENCE: AtomicU64 = AtomicU64::new(0);

        let mut hasher = RandomState::new().build_hasher();
        hasher.write_u128(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0),
        );
        hasher.write_u64(SEQUENCE.fetch_add(1, Ordering::Relaxed));
        Self(format!("job-{:016x}", hasher.finish()))
    }

    /// Accepts only identifiers in the generated format.
    #[must_use]
    pub fn parse(id: &str) -> Option<Self> {
        let hex = id.strip_prefix("job-")?;
        (hex.len() == 16 && hex.chars().all(|c| c.is_ascii_hexdigit()))
            .then(|| Self(id.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
