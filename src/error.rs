//! Unified error handling for the fastmirror crate
//!
//! Every module defines its own error enum; [`Error`] wraps them so callers
//! crossing module boundaries can use a single type. [`ErrorCategory`] and
//! [`FastmirrorError`] let the refresh loop tell per-host failures, which are
//! recovered locally, from startup failures, which are fatal.

use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::loader::LoadError;
pub use crate::probe::ProbeError;
pub use crate::ranking::RankingError;
pub use crate::sampler::SampleError;
pub use crate::server::ServerError;

/// Common trait for all fastmirror error types
pub trait FastmirrorError: std::error::Error {
    /// Whether the next refresh cycle may succeed where this one failed
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Probe or sampling failures against a single host
    Measurement,
    /// Group-level selection failures
    Selection,
    /// Sockets, HTTP serving, permissions
    Network,
    /// Configuration and domain list errors
    Config,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Measurement => "measurement",
            Self::Selection => "selection",
            Self::Network => "network",
            Self::Config => "config",
        }
    }
}

/// Unified error type for the fastmirror crate
#[derive(Error, Debug)]
pub enum Error {
    /// Latency probe errors
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// Throughput sampling errors
    #[error("Sample error: {0}")]
    Sample(#[from] SampleError),

    /// Ranking errors
    #[error("Ranking error: {0}")]
    Ranking(#[from] RankingError),

    /// Domain list errors
    #[error("Domain list error: {0}")]
    Load(#[from] LoadError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(#[from] ServerError),
}

impl FastmirrorError for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Probe(ProbeError::Privilege { .. }) => false,
            Self::Probe(_) => true,
            Self::Sample(SampleError::AllAttemptsFailed { .. }) => true,
            Self::Sample(_) => false,
            Self::Ranking(_) => true, // stale selection is kept
            Self::Load(_) => false,
            Self::Config(_) => false,
            Self::Server(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Probe(ProbeError::Privilege { .. }) => ErrorCategory::Network,
            Self::Probe(_) | Self::Sample(SampleError::AllAttemptsFailed { .. }) => {
                ErrorCategory::Measurement
            }
            Self::Sample(_) => ErrorCategory::Config,
            Self::Ranking(_) => ErrorCategory::Selection,
            Self::Load(_) | Self::Config(_) => ErrorCategory::Config,
            Self::Server(_) => ErrorCategory::Network,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let err = Error::Probe(ProbeError::unreachable("a.test", "timed out"));
        assert_eq!(err.category(), ErrorCategory::Measurement);

        let err = Error::Ranking(RankingError::EmptyGroup {
            group: "all".to_string(),
        });
        assert_eq!(err.category(), ErrorCategory::Selection);
    }

    #[test]
    fn test_privilege_is_fatal() {
        let err = Error::Probe(ProbeError::Privilege {
            reason: "Operation not permitted".to_string(),
        });
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_per_host_errors_are_recoverable() {
        let err: Error = ProbeError::PacketLoss {
            host: "a.test".to_string(),
            sent: 2,
            received: 1,
        }
        .into();
        assert!(err.is_recoverable());

        let err: Error = SampleError::AllAttemptsFailed {
            host: "a.test".to_string(),
            attempts: 32,
        }
        .into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_load_error_is_fatal() {
        let err: Error = LoadError::Empty {
            path: "all.txt".into(),
        }
        .into();
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), ErrorCategory::Config);
    }

    #[test]
    fn test_invalid_reference_url_is_config() {
        let err: Error = SampleError::InvalidUrl("https://bad host/x".to_string()).into();
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), ErrorCategory::Config);
        assert_eq!(err.category().as_str(), "config");
    }
}
