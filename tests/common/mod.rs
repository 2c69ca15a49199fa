//! Common test utilities

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use fastmirror::models::{CandidateGroup, RankBy};
use fastmirror::probe::{ProbeError, ProbeResult, Prober};
use fastmirror::ranking::RankingEngine;
use fastmirror::sampler::{SampleError, SampleResult, ThroughputSampler};

/// Prober answering from a table; unknown hosts are unreachable
#[derive(Default)]
pub struct FakeProber {
    table: Mutex<HashMap<String, Result<u64, ProbeError>>>,
}

impl FakeProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(self, host: &str, ms: u64) -> Self {
        self.set_latency(host, ms);
        self
    }

    pub fn with_loss(self, host: &str) -> Self {
        self.table.lock().unwrap().insert(
            host.to_string(),
            Err(ProbeError::PacketLoss {
                host: host.to_string(),
                sent: 2,
                received: 1,
            }),
        );
        self
    }

    pub fn set_latency(&self, host: &str, ms: u64) {
        self.table.lock().unwrap().insert(host.to_string(), Ok(ms));
    }

    pub fn set_unreachable(&self, host: &str) {
        self.table
            .lock()
            .unwrap()
            .insert(host.to_string(), Err(ProbeError::unreachable(host, "timed out")));
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, host: &str) -> ProbeResult<u64> {
        self.table
            .lock()
            .unwrap()
            .get(host)
            .cloned()
            .unwrap_or_else(|| Err(ProbeError::unreachable(host, "unknown host")))
    }
}

/// Sampler answering from a table and counting calls; unknown hosts fail
#[derive(Default)]
pub struct FakeSampler {
    table: Mutex<HashMap<String, u64>>,
    calls: AtomicUsize,
}

impl FakeSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_throughput(self, host: &str, ms: u64) -> Self {
        self.table.lock().unwrap().insert(host.to_string(), ms);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ThroughputSampler for FakeSampler {
    async fn sample(&self, host: &str, concurrency: usize) -> SampleResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.table
            .lock()
            .unwrap()
            .get(host)
            .copied()
            .ok_or_else(|| SampleError::AllAttemptsFailed {
                host: host.to_string(),
                attempts: concurrency,
            })
    }
}

/// Ranking engine over the given fakes, ranked by latency
#[allow(dead_code)]
pub fn engine(prober: Arc<FakeProber>, sampler: Arc<FakeSampler>) -> RankingEngine {
    RankingEngine::new(prober, sampler, 4, RankBy::Latency)
}

/// Group from host names
#[allow(dead_code)]
pub fn group(name: &str, hosts: &[&str], sample_throughput: bool) -> CandidateGroup {
    CandidateGroup::new(
        name,
        hosts.iter().map(|h| h.to_string()).collect(),
        sample_throughput,
    )
}
