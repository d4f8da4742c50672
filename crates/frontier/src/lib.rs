//! The priority frontier (spec.md §4.6/§5/§9): an indexed heap plus a
//! per-URL presence map, so pause/resume and domain freeze can reorder
//! or elide entries without the O(n) scans a naive `Vec`-backed queue
//! would need (spec.md §9's redesign note on "priority queue semantics").

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use dashmap::DashMap;
use onionwatch_core::{DomainPolicy, DomainStatus, FrontierEntry, DEFAULT_PRIORITY};
use tokio::sync::{Mutex, Notify};
use tracing::debug;

/// Sort key for a read-only queue snapshot (dashboard "queue contents").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueSort {
    Priority,
    Depth,
    /// Dispatch order is priority-based, not insertion order; `snapshot`
    /// leaves entries in heap-internal order for this variant rather than
    /// claiming an exact recency ordering it can't cheaply provide.
    Recent,
}

/// A heap entry ordering by `priority_score` descending, then by
/// insertion sequence ascending (FIFO among equal priorities).
struct QueuedEntry {
    priority_score: f64,
    seq: u64,
    entry: FrontierEntry,
}

impl PartialEq for QueuedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority_score == other.priority_score && self.seq == other.seq
    }
}
impl Eq for QueuedEntry {}

impl Ord for QueuedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority_score
            .partial_cmp(&other.priority_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for QueuedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct Inner {
    heap: BinaryHeap<QueuedEntry>,
    present: HashSet<String>,
    seq_counter: u64,
}

/// A multi-reader FIFO keyed on priority (spec.md §4.6). Internally
/// synchronized; safe to share across workers behind an `Arc`.
pub struct Frontier {
    inner: Mutex<Inner>,
    domain_policies: DashMap<String, DomainPolicy>,
    paused: AtomicBool,
    len: AtomicU64,
    notify: Notify,
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

impl Frontier {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            domain_policies: DashMap::new(),
            paused: AtomicBool::new(false),
            len: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    fn domain_of(url: &str) -> Option<String> {
        url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string))
    }

    fn effective_priority(&self, domain: &str, base: f64) -> f64 {
        self.domain_policies
            .get(domain)
            .map(|p| base + p.priority_boost)
            .unwrap_or(base)
    }

    /// Dedup by URL: returns `false` without enqueuing if the URL is
    /// already present. Priority is boosted by the domain's
    /// `priority_boost` at insertion time.
    pub async fn enqueue(&self, url: impl Into<String>, depth: u32, priority_score: f64) -> bool {
        let url = url.into();
        let domain = Self::domain_of(&url);
        let boosted = domain
            .as_deref()
            .map(|d| self.effective_priority(d, priority_score))
            .unwrap_or(priority_score);

        let mut inner = self.inner.lock().await;
        if !inner.present.insert(url.clone()) {
            return false;
        }
        inner.seq_counter += 1;
        let seq = inner.seq_counter;
        inner.heap.push(QueuedEntry {
            priority_score: boosted,
            seq,
            entry: FrontierEntry {
                url,
                depth,
                priority_score: boosted,
            },
        });
        drop(inner);
        self.len.fetch_add(1, AtomicOrdering::SeqCst);
        self.notify.notify_one();
        true
    }

    pub async fn enqueue_default(&self, url: impl Into<String>, depth: u32) -> bool {
        self.enqueue(url, depth, DEFAULT_PRIORITY).await
    }

    /// Pops the highest-priority entry, silently eliding (re-popping
    /// past) any entry whose domain is currently frozen rather than
    /// scanning the heap to remove it up front.
    async fn pop_one(&self) -> Option<FrontierEntry> {
        let mut inner = self.inner.lock().await;
        loop {
            let queued = inner.heap.pop()?;
            inner.present.remove(&queued.entry.url);
            self.len.fetch_sub(1, AtomicOrdering::SeqCst);

            let domain = Self::domain_of(&queued.entry.url);
            let frozen = domain
                .as_deref()
                .map(|d| self.domain_policies.get(d).map(|p| p.status == DomainStatus::Frozen).unwrap_or(false))
                .unwrap_or(false);
            if frozen {
                debug!(url = %queued.entry.url, "eliding frontier entry for frozen domain");
                continue;
            }
            return Some(queued.entry);
        }
    }

    /// Blocks up to `timeout` for an entry. While paused, returns `None`
    /// immediately without popping — the worker is expected to hold its
    /// queue token and re-poll shortly (spec.md §5's pause semantics).
    pub async fn dequeue(&self, timeout: Duration) -> Option<FrontierEntry> {
        if self.paused.load(AtomicOrdering::SeqCst) {
            return None;
        }
        if let Some(e) = self.pop_one().await {
            return Some(e);
        }
        let wait = self.notify.notified();
        tokio::select! {
            _ = wait => self.pop_one().await,
            _ = tokio::time::sleep(timeout) => None,
        }
    }

    pub fn len(&self) -> u64 {
        self.len.load(AtomicOrdering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.inner.lock().await.present.contains(url)
    }

    /// A non-destructive, sorted copy of the current queue contents, for
    /// the dashboard's "queue contents" read. Does not affect dispatch
    /// order — the heap itself is untouched.
    pub async fn snapshot(&self, sort: QueueSort, limit: usize) -> Vec<FrontierEntry> {
        let inner = self.inner.lock().await;
        let mut entries: Vec<FrontierEntry> = inner.heap.iter().map(|q| q.entry.clone()).collect();
        match sort {
            QueueSort::Priority => entries.sort_by(|a, b| b.priority_score.partial_cmp(&a.priority_score).unwrap_or(Ordering::Equal)),
            QueueSort::Depth => entries.sort_by_key(|e| e.depth),
            QueueSort::Recent => {}
        }
        entries.truncate(limit);
        entries
    }

    pub fn pause(&self) {
        self.paused.store(true, AtomicOrdering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, AtomicOrdering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(AtomicOrdering::SeqCst)
    }

    pub fn set_domain_policy(&self, policy: DomainPolicy) {
        self.domain_policies.insert(policy.domain.clone(), policy);
    }

    pub fn freeze_domain(&self, domain: &str) {
        self.domain_policies
            .entry(domain.to_string())
            .or_insert_with(|| DomainPolicy {
                domain: domain.to_string(),
                ..DomainPolicy::default()
            })
            .status = DomainStatus::Frozen;
    }

    pub fn unfreeze_domain(&self, domain: &str) {
        if let Some(mut policy) = self.domain_policies.get_mut(domain) {
            policy.status = DomainStatus::Normal;
        }
    }

    pub fn boost_domain(&self, domain: &str, boost: f64) {
        self.domain_policies
            .entry(domain.to_string())
            .or_insert_with(|| DomainPolicy {
                domain: domain.to_string(),
                ..DomainPolicy::default()
            })
            .priority_boost = boost;
    }

    pub fn domain_policy(&self, domain: &str) -> Option<DomainPolicy> {
        self.domain_policies.get(domain).map(|p| p.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dequeue_returns_highest_priority_first() {
        let frontier = Frontier::new();
        frontier.enqueue("http://a.onion/1", 0, 10.0).await;
        frontier.enqueue("http://a.onion/2", 0, 90.0).await;
        let first = frontier.dequeue(Duration::from_millis(50)).await.unwrap();
        assert_eq!(first.url, "http://a.onion/2");
    }

    #[tokio::test]
    async fn equal_priority_is_fifo() {
        let frontier = Frontier::new();
        frontier.enqueue("http://a.onion/1", 0, 50.0).await;
        frontier.enqueue("http://a.onion/2", 0, 50.0).await;
        let first = frontier.dequeue(Duration::from_millis(50)).await.unwrap();
        assert_eq!(first.url, "http://a.onion/1");
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_rejected() {
        let frontier = Frontier::new();
        assert!(frontier.enqueue("http://a.onion/1", 0, 50.0).await);
        assert!(!frontier.enqueue("http://a.onion/1", 0, 50.0).await);
        assert_eq!(frontier.len(), 1);
    }

    #[tokio::test]
    async fn frozen_domain_entries_are_elided_at_dequeue() {
        let frontier = Frontier::new();
        frontier.enqueue("http://a.onion/1", 0, 50.0).await;
        frontier.freeze_domain("a.onion");
        frontier.enqueue("http://b.onion/1", 0, 10.0).await;
        let popped = frontier.dequeue(Duration::from_millis(50)).await.unwrap();
        assert_eq!(popped.url, "http://b.onion/1");
        assert!(frontier.dequeue(Duration::from_millis(20)).await.is_none());
    }

    #[tokio::test]
    async fn paused_frontier_yields_nothing() {
        let frontier = Frontier::new();
        frontier.enqueue("http://a.onion/1", 0, 50.0).await;
        frontier.pause();
        assert!(frontier.dequeue(Duration::from_millis(20)).await.is_none());
        frontier.resume();
        assert!(frontier.dequeue(Duration::from_millis(20)).await.is_some());
    }

    #[tokio::test]
    async fn domain_boost_raises_effective_priority() {
        let frontier = Frontier::new();
        frontier.boost_domain("a.onion", 100.0);
        frontier.enqueue("http://b.onion/1", 0, 50.0).await;
        frontier.enqueue("http://a.onion/1", 0, 50.0).await;
        let first = frontier.dequeue(Duration::from_millis(50)).await.unwrap();
        assert_eq!(first.url, "http://a.onion/1");
    }

    #[tokio::test]
    async fn snapshot_is_read_only_and_sorted_by_priority() {
        let frontier = Frontier::new();
        frontier.enqueue("http://a.onion/1", 0, 10.0).await;
        frontier.enqueue("http://a.onion/2", 0, 90.0).await;
        let snap = frontier.snapshot(QueueSort::Priority, 10).await;
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].url, "http://a.onion/2");
        assert_eq!(frontier.len(), 2);
    }
}
