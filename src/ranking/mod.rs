//! Ranking engine
//!
//! Measures every candidate of a group concurrently, drops the ones that
//! failed, and orders the rest by the configured key. Every candidate runs in
//! its own task that owns a private [`Candidate`]; results are collected back
//! in input order once all tasks have finished, so nothing is shared while
//! measurements are in flight.

use std::sync::Arc;
use std::time::Instant;

use crate::error::{Error, FastmirrorError};
use crate::metrics;
use crate::models::{Candidate, CandidateGroup, RankBy};
use crate::probe::Prober;
use crate::sampler::ThroughputSampler;

/// Errors raised from a ranked result
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RankingError {
    /// No candidate of the group survived measurement
    #[error("No eligible candidate in group '{group}'")]
    EmptyGroup { group: String },
}

/// Eligible candidates of one group, best first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedResult {
    group: String,
    candidates: Vec<Candidate>,
}

impl RankedResult {
    /// Filter and order measured candidates
    ///
    /// Ineligible candidates are removed; the rest are stable-sorted by
    /// `rank_by`, so equal keys keep their input order.
    pub fn from_measured(
        group: impl Into<String>,
        measured: Vec<Candidate>,
        rank_by: RankBy,
    ) -> Self {
        let mut candidates: Vec<Candidate> =
            measured.into_iter().filter(Candidate::is_eligible).collect();
        candidates.sort_by_key(|c| rank_by.key(c));

        Self {
            group: group.into(),
            candidates,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Host names, best first
    pub fn names(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.name.as_str()).collect()
    }

    /// The selected candidate
    pub fn fastest(&self) -> Result<&Candidate, RankingError> {
        self.candidates.first().ok_or_else(|| RankingError::EmptyGroup {
            group: self.group.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Measures and orders candidate groups
pub struct RankingEngine {
    prober: Arc<dyn Prober>,
    sampler: Arc<dyn ThroughputSampler>,
    concurrency: usize,
    rank_by: RankBy,
}

impl RankingEngine {
    pub fn new(
        prober: Arc<dyn Prober>,
        sampler: Arc<dyn ThroughputSampler>,
        concurrency: usize,
        rank_by: RankBy,
    ) -> Self {
        Self {
            prober,
            sampler,
            concurrency,
            rank_by,
        }
    }

    pub fn rank_by(&self) -> RankBy {
        self.rank_by
    }

    /// Measure and rank every host of `group`
    ///
    /// Returns once every measurement has finished. An empty group, or one
    /// where every host failed, yields an empty result.
    pub async fn rank(&self, group: &CandidateGroup) -> RankedResult {
        let started = Instant::now();

        let handles: Vec<_> = group
            .candidates()
            .into_iter()
            .map(|candidate| {
                let prober = Arc::clone(&self.prober);
                let sampler = Arc::clone(&self.sampler);
                let group_name = group.name.clone();
                let sample = group.sample_throughput;
                let concurrency = self.concurrency;
                tokio::spawn(async move {
                    measure(candidate, &group_name, prober, sampler, sample, concurrency).await
                })
            })
            .collect();

        let joined = futures::future::join_all(handles).await;

        let measured: Vec<Candidate> = joined
            .into_iter()
            .zip(&group.hosts)
            .filter_map(|(result, host)| match result {
                Ok(candidate) => Some(candidate),
                Err(e) => {
                    tracing::error!(group = %group.name, host = %host, error = %e, "measurement task failed");
                    None
                }
            })
            .collect();

        let ranked = RankedResult::from_measured(group.name.clone(), measured, self.rank_by);

        tracing::info!(
            group = %group.name,
            candidates = group.len(),
            eligible = ranked.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "group ranked"
        );

        ranked
    }
}

async fn measure(
    mut candidate: Candidate,
    group: &str,
    prober: Arc<dyn Prober>,
    sampler: Arc<dyn ThroughputSampler>,
    sample: bool,
    concurrency: usize,
) -> Candidate {
    match prober.probe(&candidate.name).await {
        Ok(ms) => {
            metrics::record_probe(group, "ok");
            candidate.latency_ms = Some(ms);
        }
        Err(e) => {
            metrics::record_probe(group, e.kind());
            report_failure(group, &candidate.name, "probe", e.into());
            return candidate;
        }
    }

    if sample {
        match sampler.sample(&candidate.name, concurrency).await {
            Ok(ms) => {
                metrics::record_sample(group, "ok");
                candidate.throughput_ms = Some(ms);
            }
            Err(e) => {
                metrics::record_sample(group, "failed");
                report_failure(group, &candidate.name, "sample", e.into());
                candidate.measurement_failed = true;
            }
        }
    }

    candidate
}

/// Log a dropped candidate; failures no later cycle can fix are errors
fn report_failure(group: &str, host: &str, stage: &'static str, err: Error) {
    let category = err.category().as_str();
    if err.is_recoverable() {
        tracing::warn!(group, host, stage, category, error = %err, "measurement failed");
    } else {
        tracing::error!(group, host, stage, category, error = %err, "measurement cannot run");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ProbeError, ProbeResult};
    use crate::sampler::{SampleError, SampleResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TableProber(HashMap<&'static str, u64>);

    #[async_trait]
    impl Prober for TableProber {
        async fn probe(&self, host: &str) -> ProbeResult<u64> {
            self.0
                .get(host)
                .copied()
                .ok_or_else(|| ProbeError::unreachable(host, "not in table"))
        }
    }

    #[derive(Default)]
    struct CountingSampler {
        calls: AtomicUsize,
        failing: Vec<&'static str>,
    }

    #[async_trait]
    impl ThroughputSampler for CountingSampler {
        async fn sample(&self, host: &str, _concurrency: usize) -> SampleResult<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(&host) {
                Err(SampleError::AllAttemptsFailed {
                    host: host.to_string(),
                    attempts: 1,
                })
            } else {
                Ok(100)
            }
        }
    }

    fn candidate(name: &str, latency: Option<u64>) -> Candidate {
        Candidate {
            latency_ms: latency,
            ..Candidate::new(name)
        }
    }

    fn group(hosts: &[&str], sample: bool) -> CandidateGroup {
        CandidateGroup::new("test", hosts.iter().map(|h| h.to_string()).collect(), sample)
    }

    #[test]
    fn test_stable_sort_on_equal_latency() {
        let measured = vec![
            candidate("A", Some(50)),
            candidate("B", Some(50)),
            candidate("C", Some(10)),
        ];
        let ranked = RankedResult::from_measured("g", measured, RankBy::Latency);
        assert_eq!(ranked.names(), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_filters_ineligible() {
        let mut failed = candidate("failed", Some(1));
        failed.measurement_failed = true;
        let measured = vec![candidate("down", None), failed, candidate("ok", Some(30))];

        let ranked = RankedResult::from_measured("g", measured, RankBy::Latency);
        assert_eq!(ranked.names(), vec!["ok"]);
    }

    #[test]
    fn test_empty_result_has_no_fastest() {
        let ranked = RankedResult::from_measured("g", vec![candidate("down", None)], RankBy::Latency);
        assert!(ranked.is_empty());
        assert_eq!(
            ranked.fastest(),
            Err(RankingError::EmptyGroup {
                group: "g".to_string()
            })
        );
    }

    #[test]
    fn test_rank_by_throughput() {
        let mut slow_download = candidate("a", Some(5));
        slow_download.throughput_ms = Some(900);
        let mut fast_download = candidate("b", Some(50));
        fast_download.throughput_ms = Some(100);

        let ranked = RankedResult::from_measured(
            "g",
            vec![slow_download, fast_download],
            RankBy::Throughput,
        );
        assert_eq!(ranked.names(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_not_sampled() {
        let prober = Arc::new(TableProber(HashMap::from([("y.test", 30), ("z.test", 10)])));
        let sampler = Arc::new(CountingSampler::default());
        let engine = RankingEngine::new(prober, sampler.clone(), 4, RankBy::Latency);

        let ranked = engine.rank(&group(&["x.test", "y.test", "z.test"], true)).await;

        assert_eq!(ranked.names(), vec!["z.test", "y.test"]);
        assert_eq!(sampler.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sampling_failure_excludes_host() {
        let prober = Arc::new(TableProber(HashMap::from([("a.test", 5), ("b.test", 20)])));
        let sampler = Arc::new(CountingSampler {
            failing: vec!["a.test"],
            ..Default::default()
        });
        let engine = RankingEngine::new(prober, sampler, 4, RankBy::Latency);

        let ranked = engine.rank(&group(&["a.test", "b.test"], true)).await;
        assert_eq!(ranked.names(), vec!["b.test"]);
        assert_eq!(ranked.candidates()[0].throughput_ms, Some(100));
    }

    #[tokio::test]
    async fn test_latency_only_group_skips_sampler() {
        let prober = Arc::new(TableProber(HashMap::from([("a.test", 5)])));
        let sampler = Arc::new(CountingSampler::default());
        let engine = RankingEngine::new(prober, sampler.clone(), 4, RankBy::Latency);

        let ranked = engine.rank(&group(&["a.test"], false)).await;
        assert_eq!(ranked.names(), vec!["a.test"]);
        assert_eq!(sampler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_group() {
        let prober = Arc::new(TableProber(HashMap::new()));
        let sampler = Arc::new(CountingSampler::default());
        let engine = RankingEngine::new(prober, sampler, 4, RankBy::Latency);

        let ranked = engine.rank(&group(&[], true)).await;
        assert!(ranked.is_empty());
        assert_eq!(ranked.group(), "test");
    }
}
