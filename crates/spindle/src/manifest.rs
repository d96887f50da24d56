//! Application manifest
//!
//! Metadata about the embedding application plus the process-wide timeout
//! configuration consumed by the coordinator and the app host. The manifest
//! is seeded into the container, so any component can depend on
//! `Arc<Manifest>`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default per-hook timeout for both phases
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-phase hook timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    /// Bound on each individual start hook invocation
    pub start: Duration,
    /// Bound on each individual stop hook invocation
    pub stop: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            start: DEFAULT_TIMEOUT,
            stop: DEFAULT_TIMEOUT,
        }
    }
}

/// Metadata describing the embedding application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Application name
    pub application: String,
    /// Application version
    pub version: semver::Version,
    /// When this manifest was created
    pub created_at: DateTime<Utc>,
    /// Lifecycle timeouts
    pub timeouts: Timeouts,
}

impl Manifest {
    /// Create a manifest; fails when `version` is not valid semver
    pub fn new(application: impl Into<String>, version: &str) -> Result<Self> {
        let version = semver::Version::parse(version)
            .map_err(|err| Error::manifest(format!("invalid version `{version}`: {err}")))?;
        Ok(Self {
            application: application.into(),
            version,
            created_at: Utc::now(),
            timeouts: Timeouts::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_parsed_strictly() {
        let manifest = Manifest::new("demo", "1.2.3").unwrap();
        assert_eq!(manifest.version.major, 1);
        assert!(Manifest::new("demo", "not-a-version").is_err());
    }

    #[test]
    fn default_timeouts_are_sane() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.start, DEFAULT_TIMEOUT);
        assert_eq!(timeouts.stop, DEFAULT_TIMEOUT);
    }
}
