//! Selection store: the current best host of every group
//!
//! The store is the only state shared between the refresh loop and request
//! handlers. The whole group map sits behind an [`ArcSwap`]; readers take a
//! lock-free snapshot and a publish swaps in a new map, so a reader sees
//! either the old record or the new one, never a mix.
//!
//! An empty publish keeps the previous record. Once a group has had a
//! selection, readers never see it disappear.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::Candidate;

/// The host selected for a group and the measurements it won with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionRecord {
    pub host: Arc<str>,
    pub latency_ms: Option<u64>,
    pub throughput_ms: Option<u64>,
    pub published_at: DateTime<Utc>,
}

impl SelectionRecord {
    fn new(host: &str, latency_ms: Option<u64>, throughput_ms: Option<u64>) -> Self {
        Self {
            host: Arc::from(host),
            latency_ms,
            throughput_ms,
            published_at: Utc::now(),
        }
    }
}

/// What a publish did to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A new record was stored; `changed` is false when the host stayed the same
    Published { changed: bool },

    /// Nothing to publish; the previous record was kept
    Retained,

    /// Nothing to publish and the group has never had a selection
    Unavailable,
}

impl PublishOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published { changed: true } => "changed",
            Self::Published { changed: false } => "unchanged",
            Self::Retained => "retained",
            Self::Unavailable => "unavailable",
        }
    }
}

type RecordMap = HashMap<String, Arc<SelectionRecord>>;

/// Concurrency-safe map from group name to its selected host
#[derive(Debug)]
pub struct SelectionStore {
    records: ArcSwap<RecordMap>,
}

impl Default for SelectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStore {
    pub fn new() -> Self {
        Self {
            records: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Publish `host` as the selection for `group`
    ///
    /// An empty `host` retains the previous selection.
    pub fn publish(&self, group: &str, host: &str) -> PublishOutcome {
        self.store(group, host, None, None)
    }

    /// Publish a ranked candidate together with its measurements
    pub fn publish_candidate(&self, group: &str, candidate: &Candidate) -> PublishOutcome {
        self.store(
            group,
            &candidate.name,
            candidate.latency_ms,
            candidate.throughput_ms,
        )
    }

    fn store(
        &self,
        group: &str,
        host: &str,
        latency_ms: Option<u64>,
        throughput_ms: Option<u64>,
    ) -> PublishOutcome {
        if host.is_empty() {
            return if self.records.load().contains_key(group) {
                PublishOutcome::Retained
            } else {
                PublishOutcome::Unavailable
            };
        }

        let record = Arc::new(SelectionRecord::new(host, latency_ms, throughput_ms));
        let previous = self.records.rcu(|current| {
            let mut next = RecordMap::clone(current);
            next.insert(group.to_string(), Arc::clone(&record));
            next
        });

        let changed = previous
            .get(group)
            .map_or(true, |old| old.host.as_ref() != host);
        PublishOutcome::Published { changed }
    }

    /// Currently selected host of `group`
    ///
    /// `None` means no selection has been published yet.
    pub fn read(&self, group: &str) -> Option<Arc<str>> {
        self.records
            .load()
            .get(group)
            .map(|record| Arc::clone(&record.host))
    }

    /// Full record of the current selection of `group`
    pub fn record(&self, group: &str) -> Option<Arc<SelectionRecord>> {
        self.records.load().get(group).cloned()
    }

    /// Consistent copy of every current selection
    pub fn snapshot(&self) -> HashMap<String, Arc<SelectionRecord>> {
        RecordMap::clone(&self.records.load())
    }

    /// Whether every one of `groups` has a selection
    pub fn has_all<'a>(&self, groups: impl IntoIterator<Item = &'a str>) -> bool {
        let records = self.records.load();
        groups.into_iter().all(|g| records.contains_key(g))
    }

    pub fn len(&self) -> usize {
        self.records.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.load().is_empty()
    }
}
