//! Configuration management for fastmirror
//!
//! Configuration is loaded from a TOML file or from defaults overridden by
//! `FASTMIRROR_*` environment variables. Command-line flags are applied on top
//! by the binary, after which [`Config::validate`] must pass.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::RankBy;

/// Reference resource fetched from every mirror when sampling throughput
pub const DEFAULT_REFERENCE_PATH: &str = "/project/sevenzip/files/7-Zip/23.01/7zr.exe?viasf=1";

/// First path segments taken by the health and metrics routes
pub const RESERVED_GROUP_NAMES: [&str; 2] = ["health", "metrics"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// ICMP probe settings
    pub probe: ProbeConfig,

    /// Throughput sampling settings
    pub sampler: SamplerConfig,

    /// Ranking settings
    pub ranking: RankingConfig,

    /// Refresh loop settings
    pub refresh: RefreshConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Redirect URI rewriting
    pub redirect: RedirectConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Candidate groups, one list file each
    pub groups: Vec<GroupConfig>,
}

/// ICMP probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Echo requests sent per probe
    pub count: u16,

    /// Timeout per echo request in seconds
    pub timeout_secs: u64,

    /// Use raw ICMP sockets (needs CAP_NET_RAW or root)
    pub privileged: bool,
}

/// Throughput sampler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Simultaneous download attempts per host
    pub concurrency: usize,

    /// Timeout per download attempt in seconds
    pub timeout_secs: u64,

    /// URL scheme used to reach mirrors
    pub scheme: String,

    /// Path (and query) of the reference resource, identical for every host
    pub reference_path: String,

    /// User agent string
    pub user_agent: String,
}

/// Ranking configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Sort key for eligible candidates
    pub rank_by: RankBy,
}

/// Refresh loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between refresh cycles
    pub interval_secs: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: SocketAddr,

    /// Enable request logging
    pub enable_request_logging: bool,

    /// Seconds advertised in `Retry-After` while no mirror is selected
    pub retry_after_secs: u64,
}

/// One substring replacement applied to redirected paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub from: String,
    #[serde(default)]
    pub to: String,
}

impl RewriteRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Redirect URI construction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// Scheme of the redirect target
    pub scheme: String,

    /// Query string appended to every redirect (without `?`), empty for none
    pub query: String,

    /// Replacements applied in order, first occurrence only
    pub rewrites: Vec<RewriteRule>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

/// A candidate group backed by a domain list file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Group name, served under `/{name}/...`
    pub name: String,

    /// Domain list file, one host per line
    pub file: PathBuf,

    /// Sample download throughput in addition to latency
    #[serde(default = "default_true")]
    pub sample_throughput: bool,
}

fn default_true() -> bool {
    true
}

impl GroupConfig {
    pub fn new(name: impl Into<String>, file: impl Into<PathBuf>, sample_throughput: bool) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            sample_throughput,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            count: 1,
            timeout_secs: 1,
            privileged: true,
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            concurrency: 32,
            timeout_secs: 30,
            scheme: String::from("https"),
            reference_path: String::from(DEFAULT_REFERENCE_PATH),
            user_agent: format!("fastmirror/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { interval_secs: 600 }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 1340)),
            enable_request_logging: true,
            retry_after_secs: 5,
        }
    }
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            scheme: String::from("https"),
            query: String::from("viasf=1"),
            rewrites: vec![
                RewriteRule::new("projects", "project"),
                RewriteRule::new("/download", ""),
                RewriteRule::new("/files", ""),
            ],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            probe: ProbeConfig::default(),
            sampler: SamplerConfig::default(),
            ranking: RankingConfig::default(),
            refresh: RefreshConfig::default(),
            server: ServerConfig::default(),
            redirect: RedirectConfig::default(),
            logging: LoggingConfig::default(),
            groups: vec![
                GroupConfig::new("all", "all.txt", false),
                GroupConfig::new("single", "single.txt", true),
                GroupConfig::new("multi", "multi.txt", true),
            ],
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from defaults and environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(count) = env_parse("FASTMIRROR_PROBE_COUNT") {
            config.probe.count = count;
        }
        if let Some(timeout) = env_parse("FASTMIRROR_PROBE_TIMEOUT") {
            config.probe.timeout_secs = timeout;
        }
        if let Some(privileged) = env_parse("FASTMIRROR_PROBE_PRIVILEGED") {
            config.probe.privileged = privileged;
        }
        if let Some(threads) = env_parse("FASTMIRROR_THREADS") {
            config.sampler.concurrency = threads;
        }
        if let Some(timeout) = env_parse("FASTMIRROR_SAMPLE_TIMEOUT") {
            config.sampler.timeout_secs = timeout;
        }
        if let Some(interval) = env_parse("FASTMIRROR_REFRESH_INTERVAL") {
            config.refresh.interval_secs = interval;
        }
        if let Ok(rank_by) = std::env::var("FASTMIRROR_RANK_BY") {
            config.ranking.rank_by = rank_by
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("Invalid FASTMIRROR_RANK_BY")?;
        }
        if let Ok(bind) = std::env::var("FASTMIRROR_BIND") {
            config.server.bind_address = bind
                .parse()
                .with_context(|| format!("Invalid FASTMIRROR_BIND address: {bind}"))?;
        }
        if let Ok(level) = std::env::var("FASTMIRROR_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("FASTMIRROR_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.probe.count == 0 {
            return Err(ConfigError::invalid("probe.count", "Must send at least 1 packet"));
        }

        if self.probe.timeout_secs == 0 {
            return Err(ConfigError::invalid("probe.timeout_secs", "Must be greater than 0"));
        }

        if self.sampler.concurrency == 0 {
            return Err(ConfigError::invalid(
                "sampler.concurrency",
                "Must run at least 1 download attempt",
            ));
        }

        if self.sampler.timeout_secs == 0 {
            return Err(ConfigError::invalid("sampler.timeout_secs", "Must be greater than 0"));
        }

        if !self.sampler.reference_path.starts_with('/') {
            return Err(ConfigError::invalid(
                "sampler.reference_path",
                "Must start with '/'",
            ));
        }

        if self.refresh.interval_secs == 0 {
            return Err(ConfigError::invalid("refresh.interval_secs", "Must be greater than 0"));
        }

        if self.groups.is_empty() {
            return Err(ConfigError::MissingField {
                field: "groups".to_string(),
            });
        }

        for (i, group) in self.groups.iter().enumerate() {
            if RESERVED_GROUP_NAMES.contains(&group.name.as_str()) {
                return Err(ConfigError::invalid(
                    format!("groups[{i}].name"),
                    format!("'{}' is a reserved route", group.name),
                ));
            }
            if group.name.is_empty() || group.name.contains('/') {
                return Err(ConfigError::invalid(
                    format!("groups[{i}].name"),
                    format!("Invalid group name '{}'", group.name),
                ));
            }
            if self.groups[..i].iter().any(|g| g.name == group.name) {
                return Err(ConfigError::invalid(
                    format!("groups[{i}].name"),
                    format!("Duplicate group name '{}'", group.name),
                ));
            }
        }

        Ok(())
    }

    /// Interval between refresh cycles
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh.interval_secs)
    }

    /// Find a group by name
    pub fn group(&self, name: &str) -> Option<&GroupConfig> {
        self.groups.iter().find(|g| g.name == name)
    }
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    InvalidValue { field: String, reason: String },
    MissingField { field: String },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
            Self::MissingField { field } => {
                write!(f, "Missing required field: {}", field)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
