//! Refresh scheduler
//!
//! Drives the measure-rank-publish cycle. [`RefreshScheduler::start`] runs one
//! complete cycle before returning, so the selection store is populated before
//! any request is served, then keeps refreshing on a fixed interval in a
//! background task.
//!
//! Every group is refreshed in its own task. A group whose candidates all fail
//! keeps its previous selection and does not hold up or abort the others.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fastmirror::scheduler::RefreshScheduler;
//!
//! let scheduler = Arc::new(RefreshScheduler::new(engine, store, groups, interval));
//! let handle = scheduler.clone().start().await;
//! // ... serve requests ...
//! scheduler.stop();
//! handle.await?;
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::metrics;
use crate::models::CandidateGroup;
use crate::ranking::{RankingEngine, RankingError};
use crate::selection::{PublishOutcome, SelectionStore};

// ============================================================================
// Refresh Events
// ============================================================================

/// Events emitted by the refresh scheduler
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    /// A group's fastest host was published
    GroupRefreshed {
        cycle: u64,
        group: String,
        host: String,
        latency_ms: Option<u64>,
        changed: bool,
    },

    /// A group produced no eligible candidate
    GroupEmpty {
        cycle: u64,
        group: String,
        retained: bool,
    },

    /// Every group of a cycle has been handled
    CycleCompleted(CycleReport),
}

/// Summary of one refresh cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    /// Groups that got a freshly measured selection
    pub published: Vec<String>,
    /// Empty groups that kept their previous selection
    pub retained: Vec<String>,
    /// Empty groups that still have no selection at all
    pub unavailable: Vec<String>,
    /// Groups whose refresh task died
    pub failed: Vec<String>,
    pub duration: Duration,
}

impl CycleReport {
    /// Whether every group got a fresh selection
    pub fn is_complete(&self) -> bool {
        self.retained.is_empty() && self.unavailable.is_empty() && self.failed.is_empty()
    }
}

// ============================================================================
// Refresh Scheduler
// ============================================================================

/// Periodically re-ranks every group and publishes the winners
pub struct RefreshScheduler {
    engine: Arc<RankingEngine>,
    store: Arc<SelectionStore>,
    groups: Vec<CandidateGroup>,
    interval: Duration,
    cycles: AtomicU64,
    event_sender: broadcast::Sender<RefreshEvent>,
    shutdown: Notify,
    is_running: AtomicBool,
}

impl RefreshScheduler {
    pub fn new(
        engine: Arc<RankingEngine>,
        store: Arc<SelectionStore>,
        groups: Vec<CandidateGroup>,
        interval: Duration,
    ) -> Self {
        let (event_sender, _) = broadcast::channel(100);

        Self {
            engine,
            store,
            groups,
            interval,
            cycles: AtomicU64::new(0),
            event_sender,
            shutdown: Notify::new(),
            is_running: AtomicBool::new(false),
        }
    }

    /// Subscribe to refresh events
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.event_sender.subscribe()
    }

    pub fn store(&self) -> &Arc<SelectionStore> {
        &self.store
    }

    pub fn groups(&self) -> &[CandidateGroup] {
        &self.groups
    }

    /// Number of cycles started so far
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Rank one group and publish its fastest host
    ///
    /// With no eligible candidate the store keeps its previous selection and
    /// `RankingError::EmptyGroup` is returned.
    pub async fn refresh_group(
        &self,
        cycle: u64,
        group: &CandidateGroup,
    ) -> Result<PublishOutcome, RankingError> {
        let ranked = self.engine.rank(group).await;

        let best = match ranked.fastest() {
            Ok(best) => best,
            Err(e) => {
                let outcome = self.store.publish(&group.name, "");
                metrics::record_publish(&group.name, outcome.as_str());
                let retained = outcome == PublishOutcome::Retained;
                tracing::warn!(
                    cycle,
                    group = %group.name,
                    candidates = group.len(),
                    retained,
                    "no eligible mirror, keeping previous selection"
                );
                let _ = self.event_sender.send(RefreshEvent::GroupEmpty {
                    cycle,
                    group: group.name.clone(),
                    retained,
                });
                return Err(e);
            }
        };

        let outcome = self.store.publish_candidate(&group.name, best);
        metrics::record_publish(&group.name, outcome.as_str());
        if let Some(ms) = best.latency_ms {
            metrics::set_selected_latency(&group.name, ms);
        }

        let changed = matches!(outcome, PublishOutcome::Published { changed: true });
        tracing::info!(
            cycle,
            group = %group.name,
            host = %best.name,
            latency_ms = ?best.latency_ms,
            throughput_ms = ?best.throughput_ms,
            changed,
            "fastest mirror published"
        );
        let _ = self.event_sender.send(RefreshEvent::GroupRefreshed {
            cycle,
            group: group.name.clone(),
            host: best.name.clone(),
            latency_ms: best.latency_ms,
            changed,
        });

        Ok(outcome)
    }

    /// Refresh every group once, concurrently
    pub async fn run_cycle(self: &Arc<Self>) -> CycleReport {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();
        tracing::debug!(cycle, groups = self.groups.len(), "refresh cycle started");

        let handles: Vec<_> = (0..self.groups.len())
            .map(|i| {
                let this = Arc::clone(self);
                tokio::spawn(async move { this.refresh_group(cycle, &this.groups[i]).await })
            })
            .collect();

        let results = futures::future::join_all(handles).await;

        let mut report = CycleReport {
            cycle,
            ..Default::default()
        };
        for (result, group) in results.into_iter().zip(&self.groups) {
            let name = group.name.clone();
            match result {
                Ok(Ok(_)) => report.published.push(name),
                Ok(Err(_)) => {
                    if self.store.read(&group.name).is_some() {
                        report.retained.push(name);
                    } else {
                        report.unavailable.push(name);
                    }
                }
                Err(e) => {
                    tracing::error!(cycle, group = %group.name, error = %e, "group refresh task failed");
                    report.failed.push(name);
                }
            }
        }
        report.duration = started.elapsed();

        metrics::record_cycle(report.duration);
        tracing::info!(
            cycle,
            published = report.published.len(),
            retained = report.retained.len(),
            unavailable = report.unavailable.len(),
            failed = report.failed.len(),
            elapsed_ms = report.duration.as_millis() as u64,
            "refresh cycle completed"
        );
        let _ = self.event_sender.send(RefreshEvent::CycleCompleted(report.clone()));

        report
    }

    /// Run the first cycle, then refresh in the background until stopped
    ///
    /// The selection store is populated when this returns.
    pub async fn start(self: Arc<Self>) -> JoinHandle<()> {
        self.is_running.store(true, Ordering::SeqCst);

        let initial = self.run_cycle().await;
        if !initial.unavailable.is_empty() {
            tracing::warn!(
                groups = ?initial.unavailable,
                "no mirror available yet for some groups, requests will get 503 until the next cycle"
            );
        }

        tokio::spawn(async move { self.run_loop().await })
    }

    /// Stop the background loop after the cycle in progress
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    async fn run_loop(self: Arc<Self>) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = self.interval.as_secs(), "refresh loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                _ = self.shutdown.notified() => {
                    break;
                }
            }
        }

        self.is_running.store(false, Ordering::SeqCst);
        tracing::info!("refresh loop stopped");
    }
}
