//! Error handling types
//!
//! Build-time errors (`DuplicateBinding`, `UnresolvedDependency`,
//! `CyclicDependency`, `CapabilityMismatch`, `InvalidManifest`) abort
//! composition before any lifecycle hook runs. Runtime errors split into the
//! fail-fast start path (`StartHook`) and the aggregated, best-effort stop
//! path (`StopHooks`).

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Lifecycle phase a hook error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Startup phase
    Start,
    /// Shutdown phase
    Stop,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Start => write!(f, "start"),
            Phase::Stop => write!(f, "stop"),
        }
    }
}

/// Main error type for the spindle runtime
#[derive(Error, Debug)]
pub enum Error {
    /// A second public binding targets an already-registered `(type, tag)` pair
    #[error("duplicate binding for {key}: first registered in `{existing}`, duplicated in `{duplicate}`")]
    DuplicateBinding {
        /// Display form of the conflicting binding key
        key: String,
        /// Module path that registered the key first
        existing: String,
        /// Module path that attempted the duplicate registration
        duplicate: String,
    },

    /// A required factory parameter has no binding
    #[error("no binding for {dependency}, required by {chain}")]
    UnresolvedDependency {
        /// Display form of the missing binding key
        dependency: String,
        /// Resolution chain that led to the missing dependency
        chain: String,
    },

    /// Resolution of a type transitively requires itself
    #[error("dependency cycle detected: {chain}")]
    CyclicDependency {
        /// The cycle's type chain, in resolution order
        chain: String,
    },

    /// A declared service implements neither lifecycle contract
    #[error("`{type_name}` was declared as a service but implements neither OnStart nor OnStop")]
    CapabilityMismatch {
        /// Type name of the rejected service
        type_name: &'static str,
    },

    /// A factory reported a construction failure
    #[error("factory for `{type_name}` failed: {message}")]
    Factory {
        /// Type name the factory produces
        type_name: &'static str,
        /// Description of the failure
        message: String,
    },

    /// Manifest construction failed
    #[error("invalid manifest: {message}")]
    InvalidManifest {
        /// Description of the failure
        message: String,
    },

    /// The coordinator was driven from an unexpected state
    #[error("lifecycle error: {message}")]
    Lifecycle {
        /// Description of the failure
        message: String,
    },

    /// A hook exceeded its configured phase timeout
    #[error("{phase} hook for `{owner}` timed out after {}", humantime::format_duration(*timeout))]
    HookTimedOut {
        /// Type name owning the hook
        owner: &'static str,
        /// Phase the hook was running in
        phase: Phase,
        /// The configured timeout that elapsed
        timeout: Duration,
    },

    /// A start hook failed; remaining startup was aborted
    #[error("start hook for `{owner}` failed: {source}")]
    StartHook {
        /// Type name owning the hook
        owner: &'static str,
        /// The underlying hook error
        #[source]
        source: Box<Error>,
    },

    /// One or more stop hooks failed; shutdown still ran to completion
    #[error("shutdown completed with {} failed stop hook(s): [{}]", failures.len(), format_failures(failures))]
    StopHooks {
        /// Every stop hook failure, in invocation order
        failures: Vec<Error>,
    },

    /// I/O error (signal handler installation)
    #[error("i/o error: {source}")]
    Io {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

fn format_failures(failures: &[Error]) -> String {
    failures
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Construct a factory failure for the given produced type
    pub fn factory<T>(message: impl Into<String>) -> Self {
        Error::Factory {
            type_name: std::any::type_name::<T>(),
            message: message.into(),
        }
    }

    /// Construct a manifest error
    pub fn manifest(message: impl Into<String>) -> Self {
        Error::InvalidManifest {
            message: message.into(),
        }
    }

    /// Construct a lifecycle state error
    pub fn lifecycle(message: impl Into<String>) -> Self {
        Error::Lifecycle {
            message: message.into(),
        }
    }

    /// Whether this error was raised while composing the graph, before any
    /// hook could run
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Error::DuplicateBinding { .. }
                | Error::UnresolvedDependency { .. }
                | Error::CyclicDependency { .. }
                | Error::CapabilityMismatch { .. }
                | Error::InvalidManifest { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_timeout_renders_human_duration() {
        let err = Error::HookTimedOut {
            owner: "demo::Server",
            phase: Phase::Start,
            timeout: Duration::from_secs(15),
        };
        assert_eq!(
            err.to_string(),
            "start hook for `demo::Server` timed out after 15s"
        );
    }

    #[test]
    fn stop_failures_are_aggregated_in_order() {
        let err = Error::StopHooks {
            failures: vec![
                Error::lifecycle("first"),
                Error::lifecycle("second"),
            ],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("2 failed stop hook(s)"));
        assert!(rendered.find("first").unwrap() < rendered.find("second").unwrap());
    }

    #[test]
    fn build_errors_are_classified() {
        assert!(Error::manifest("bad version").is_build_error());
        assert!(!Error::lifecycle("already running").is_build_error());
    }
}
