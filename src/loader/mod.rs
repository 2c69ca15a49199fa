//! Domain list loading
//!
//! A list file holds one host per line. Surrounding whitespace is trimmed,
//! blank lines and lines starting with `#` are skipped.

use std::io;
use std::path::{Path, PathBuf};

use crate::config::GroupConfig;
use crate::models::CandidateGroup;

/// Errors that can occur while loading a domain list
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// List file does not exist
    #[error("Domain list not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// A line is not a plain host name
    #[error("Invalid domain list {} at line {line}: {reason}", path.display())]
    Format {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// The file holds no host
    #[error("Domain list {} contains no hosts", path.display())]
    Empty { path: PathBuf },

    /// Other I/O failure
    #[error("Failed to read domain list {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Parse list file contents
pub fn parse_hosts(path: &Path, content: &str) -> Result<Vec<String>, LoadError> {
    let mut hosts = Vec::new();

    for (i, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let reason = if line.contains(char::is_whitespace) {
            Some("host contains whitespace")
        } else if line.contains("://") {
            Some("expected a host name, not a URL")
        } else if line.contains('/') {
            Some("host contains '/'")
        } else {
            None
        };

        if let Some(reason) = reason {
            return Err(LoadError::Format {
                path: path.to_path_buf(),
                line: i + 1,
                reason: reason.to_string(),
            });
        }

        hosts.push(line.to_string());
    }

    if hosts.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }

    Ok(hosts)
}

/// Read the hosts listed in `path`
pub fn load_group(path: &Path) -> Result<Vec<String>, LoadError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound {
            path: path.to_path_buf(),
        },
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let content = String::from_utf8(bytes).map_err(|e| LoadError::Format {
        path: path.to_path_buf(),
        line: 0,
        reason: format!("not valid UTF-8: {e}"),
    })?;

    parse_hosts(path, &content)
}

/// Load every configured group
pub fn load_groups(groups: &[GroupConfig]) -> Result<Vec<CandidateGroup>, LoadError> {
    groups
        .iter()
        .map(|g| {
            let hosts = load_group(&g.file)?;
            tracing::info!(group = %g.name, file = %g.file.display(), hosts = hosts.len(), "domain list loaded");
            Ok(CandidateGroup::new(g.name.clone(), hosts, g.sample_throughput))
        })
        .collect()
}
