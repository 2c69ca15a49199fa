pub mod rank;
pub mod serve;

use anyhow::{Context, Result};
use std::path::Path;

use fastmirror::config::Config;
use fastmirror::error::{Error, FastmirrorError};

// Re-export command functions for convenience
pub use rank::{rank, RankParams};
pub use serve::{serve, ServeParams};

/// Load configuration from `path`, or from defaults and environment variables
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Config::from_env().context("Failed to load configuration from environment"),
    }
}

/// Log a startup failure with its category and turn it into the exit error
pub fn fatal(context: &'static str, err: impl Into<Error>) -> anyhow::Error {
    let err = err.into();
    tracing::error!(
        category = err.category().as_str(),
        recoverable = err.is_recoverable(),
        error = %err,
        "{context}"
    );
    anyhow::Error::new(err).context(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastmirror::loader::LoadError;

    #[test]
    fn test_fatal_keeps_context_and_cause() {
        let err = fatal(
            "Failed to load domain lists",
            LoadError::Empty {
                path: "all.txt".into(),
            },
        );

        assert_eq!(err.to_string(), "Failed to load domain lists");
        let cause = err.downcast_ref::<Error>().unwrap();
        assert!(matches!(cause, Error::Load(LoadError::Empty { .. })));
    }
}
