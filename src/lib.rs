//! fastmirror - mirror probing and selection engine
//!
//! Measures a set of mirror hosts per group, keeps the fastest one published
//! per group, and redirects download requests to it.
//!
//! # Architecture
//!
//! - [`probe`] - ICMP round-trip latency per host
//! - [`sampler`] - concurrent HTTP download timing per host
//! - [`ranking`] - measure, filter and order the candidates of a group
//! - [`selection`] - lock-free store of the current best host per group
//! - [`scheduler`] - periodic refresh cycles over all groups
//! - [`loader`] - domain list files
//! - [`server`] - redirect, health and metrics endpoints
//! - [`config`] - configuration management
//! - [`metrics`] - Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fastmirror::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let groups = fastmirror::loader::load_groups(&config.groups)?;
//!
//!     let engine = RankingEngine::new(
//!         Arc::new(IcmpProber::new(&config.probe)?),
//!         Arc::new(HttpSampler::new(&config.sampler)?),
//!         config.sampler.concurrency,
//!         config.ranking.rank_by,
//!     );
//!     let store = Arc::new(SelectionStore::new());
//!     let scheduler = Arc::new(RefreshScheduler::new(
//!         Arc::new(engine),
//!         Arc::clone(&store),
//!         groups,
//!         config.refresh_interval(),
//!     ));
//!     let _refresh = scheduler.start().await;
//!
//!     println!("{:?}", store.read("all"));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod models;
pub mod probe;
pub mod ranking;
pub mod sampler;
pub mod scheduler;
pub mod selection;
pub mod server;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, FastmirrorError, Result};
    pub use crate::models::{Candidate, CandidateGroup, RankBy};
    pub use crate::probe::{IcmpProber, Prober};
    pub use crate::ranking::{RankedResult, RankingEngine};
    pub use crate::sampler::{HttpSampler, ThroughputSampler};
    pub use crate::scheduler::RefreshScheduler;
    pub use crate::selection::SelectionStore;
    pub use crate::server::{AppState, MirrorServer};
}

// Direct re-exports for convenience
pub use models::{Candidate, CandidateGroup, RankBy};
