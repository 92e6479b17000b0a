use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Separator between the base name and the stamp, e.g. `app-cache-v1718000000000`
const VERSION_MARKER: &str = "-v";

/// Last stamp handed out in this process; keeps generated versions unique
/// even when two installs start within the same millisecond.
static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// Identifier of one installed cache snapshot.
///
/// The name is the configured prefix plus a time-derived stamp. Only names of
/// exactly this shape are considered part of the prefix's family, so caches
/// belonging to other applications on the same storage are never touched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheVersion {
    prefix: String,
    stamp: i64,
}

impl CacheVersion {
    pub fn new(prefix: impl Into<String>, stamp: i64) -> Self {
        Self {
            prefix: prefix.into(),
            stamp,
        }
    }

    /// Generate a fresh version from the current time.
    /// Stamps are strictly increasing within a process.
    pub fn generate(prefix: &str) -> Self {
        let now = Utc::now().timestamp_millis();
        let previous = LAST_STAMP
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        Self::new(prefix, now.max(previous + 1))
    }

    /// Parse a stored cache name back into a version of `prefix`.
    pub fn parse(prefix: &str, name: &str) -> Option<Self> {
        let stamp = name.strip_prefix(prefix)?.strip_prefix(VERSION_MARKER)?;
        if stamp.is_empty() || !stamp.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        stamp.parse().ok().map(|stamp| Self::new(prefix, stamp))
    }

    /// Check whether a stored cache name belongs to `prefix`'s family
    pub fn matches_prefix(prefix: &str, name: &str) -> bool {
        Self::parse(prefix, name).is_some()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn stamp(&self) -> i64 {
        self.stamp
    }

    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.prefix, VERSION_MARKER, self.stamp)
    }
}
