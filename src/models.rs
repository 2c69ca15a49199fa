//! Core data structures shared by the prober, ranking engine and scheduler

use serde::{Deserialize, Serialize};
use std::fmt;

/// One mirror host under evaluation, with its latest measurement
///
/// A candidate is created fresh for every refresh cycle. Each measuring task
/// owns its own copy, so no locking is needed while the measurement runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Host name (domain, optionally with `:port`)
    pub name: String,

    /// Mean round-trip time in milliseconds; `None` when unmeasured or unreachable
    pub latency_ms: Option<u64>,

    /// Mean reference-download time in milliseconds; `None` when not sampled
    pub throughput_ms: Option<u64>,

    /// Throughput sampling failed after a successful latency probe
    pub measurement_failed: bool,
}

impl Candidate {
    /// Create an unmeasured candidate
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latency_ms: None,
            throughput_ms: None,
            measurement_failed: false,
        }
    }

    /// Whether this candidate may be selected
    ///
    /// A candidate is eligible only with a measured latency and no
    /// throughput failure.
    pub fn is_eligible(&self) -> bool {
        self.latency_ms.is_some() && !self.measurement_failed
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        match self.latency_ms {
            Some(ms) => write!(f, " latency={ms}ms")?,
            None => write!(f, " latency=unreachable")?,
        }
        if let Some(ms) = self.throughput_ms {
            write!(f, " download={ms}ms")?;
        }
        if self.measurement_failed {
            write!(f, " (download failed)")?;
        }
        Ok(())
    }
}

/// A named, ordered set of hosts competing for one selection slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateGroup {
    /// Group name, also the first path segment served by the router
    pub name: String,

    /// Hosts in list-file order
    pub hosts: Vec<String>,

    /// Run the throughput sampler for hosts that answered the probe
    pub sample_throughput: bool,
}

impl CandidateGroup {
    pub fn new(name: impl Into<String>, hosts: Vec<String>, sample_throughput: bool) -> Self {
        Self {
            name: name.into(),
            hosts,
            sample_throughput,
        }
    }

    /// Fresh, unmeasured candidates for one ranking pass
    pub fn candidates(&self) -> Vec<Candidate> {
        self.hosts.iter().map(Candidate::new).collect()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Sort key used by the ranking engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankBy {
    /// Ascending probe round-trip time
    #[default]
    Latency,

    /// Ascending mean download time; latency for groups that are not sampled
    Throughput,
}

impl RankBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latency => "latency",
            Self::Throughput => "throughput",
        }
    }

    /// Sort key of an eligible candidate
    pub fn key(&self, candidate: &Candidate) -> u64 {
        let latency = candidate.latency_ms.unwrap_or(u64::MAX);
        match self {
            Self::Latency => latency,
            Self::Throughput => candidate.throughput_ms.unwrap_or(latency),
        }
    }
}

impl std::str::FromStr for RankBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "latency" => Ok(Self::Latency),
            "throughput" => Ok(Self::Throughput),
            other => Err(format!("unknown ranking key '{other}', expected latency or throughput")),
        }
    }
}
