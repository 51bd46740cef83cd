//! In-memory registry of tracked tokens.
//!
//! All mutation goes through one lock, so a discovery sweep inserting a
//! token and a threshold sweep marking it can never interleave on the same
//! entry.

use crate::ladder::{self, Ladder};
use crate::TrackedToken;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Bounds on how many tokens are kept and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvictionPolicy {
    /// Maximum number of tracked tokens. Oldest insertions go first.
    pub max_entries: Option<usize>,
    /// Tokens inserted longer ago than this are dropped on the next sweep.
    pub max_age: Option<Duration>,
}

impl EvictionPolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

#[derive(Debug, Default)]
struct Inner {
    tokens: HashMap<CompactString, TrackedToken>,
    /// Insertion order of the keys in `tokens`.
    order: VecDeque<CompactString>,
}

impl Inner {
    fn remove(&mut self, id: &str) -> Option<TrackedToken> {
        let token = self.tokens.remove(id)?;
        self.order.retain(|k| k != id);
        Some(token)
    }
}

/// Thread-safe tracker store keyed by token id.
#[derive(Debug, Default)]
pub struct TrackerStore {
    inner: Mutex<Inner>,
    policy: EvictionPolicy,
}

impl TrackerStore {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Insert a new token. Returns false and changes nothing if `id` is
    /// already tracked.
    pub fn try_insert(&self, id: &str, baseline_value: f64, display_name: &str, symbol: &str) -> bool {
        self.try_insert_at(id, baseline_value, display_name, symbol, Utc::now())
    }

    pub fn try_insert_at(
        &self,
        id: &str,
        baseline_value: f64,
        display_name: &str,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let mut inner = self.lock();
        if inner.tokens.contains_key(id) {
            return false;
        }

        let key = CompactString::new(id);
        inner.tokens.insert(
            key.clone(),
            TrackedToken::new_at(id, baseline_value, display_name, symbol, now),
        );
        inner.order.push_back(key);

        if let Some(max) = self.policy.max_entries {
            while inner.order.len() > max {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.tokens.remove(&oldest);
                }
            }
        }
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().tokens.contains_key(id)
    }

    /// Snapshot of one tracked token.
    pub fn get(&self, id: &str) -> Option<TrackedToken> {
        self.lock().tokens.get(id).cloned()
    }

    /// Record a multiplier as fired. Returns true if it was newly added.
    /// Unknown ids and repeated multipliers are no-ops.
    pub fn mark_fired(&self, id: &str, multiplier: u32) -> bool {
        match self.lock().tokens.get_mut(id) {
            Some(token) => token.fired_thresholds.insert(multiplier),
            None => false,
        }
    }

    /// Evaluate a freshly fetched value against the ladder and record the
    /// newly crossed rungs, under the store lock.
    ///
    /// Two concurrent calls for the same token never both report the same
    /// rung.
    pub fn evaluate(&self, id: &str, current_value: f64, ladder: &Ladder) -> BTreeSet<u32> {
        match self.lock().tokens.get_mut(id) {
            Some(token) => ladder::evaluate(token, current_value, ladder),
            None => BTreeSet::new(),
        }
    }

    /// Snapshot of all tracked tokens in insertion order.
    pub fn all(&self) -> Vec<TrackedToken> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.tokens.get(id).cloned())
            .collect()
    }

    /// Ids of all tracked tokens in insertion order.
    pub fn ids(&self) -> Vec<CompactString> {
        self.lock().order.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop tokens older than the policy's `max_age`. Returns the evicted ids.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> Vec<CompactString> {
        let Some(max_age) = self.policy.max_age else {
            return Vec::new();
        };
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return Vec::new();
        };

        let mut inner = self.lock();
        let expired: Vec<CompactString> = inner
            .order
            .iter()
            .filter(|id| {
                inner
                    .tokens
                    .get(*id)
                    .is_some_and(|t| now - t.inserted_at > max_age)
            })
            .cloned()
            .collect();

        for id in &expired {
            inner.remove(id);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Barrier};

    #[test]
    fn test_idempotent_insertion() {
        let store = TrackerStore::default();
        assert!(store.try_insert("mint1", 100.0, "Gem", "GEM"));
        assert!(!store.try_insert("mint1", 999.0, "Other", "OTH"));

        assert_eq!(store.len(), 1);
        let token = store.get("mint1").unwrap();
        assert_eq!(token.baseline_value, 100.0);
        assert_eq!(token.display_name, "Gem");
    }

    #[test]
    fn test_get_missing() {
        let store = TrackerStore::default();
        assert!(store.get("nope").is_none());
        assert!(!store.contains("nope"));
    }

    #[test]
    fn test_insertion_order() {
        let store = TrackerStore::default();
        for id in ["c", "a", "b"] {
            store.try_insert(id, 1.0, id, id);
        }
        store.try_insert("a", 1.0, "a", "a");

        let ids: Vec<_> = store.all().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(store.ids(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_mark_fired_idempotent() {
        let store = TrackerStore::default();
        store.try_insert("mint1", 100.0, "Gem", "GEM");

        assert!(store.mark_fired("mint1", 2));
        assert!(!store.mark_fired("mint1", 2));
        assert!(!store.mark_fired("unknown", 2));
        assert_eq!(store.get("mint1").unwrap().fired_thresholds, BTreeSet::from([2]));
    }

    #[test]
    fn test_evaluate_through_store() {
        let store = TrackerStore::default();
        store.try_insert("mint1", 100.0, "Gem", "GEM");
        store.mark_fired("mint1", 2);

        let crossed = store.evaluate("mint1", 450.0, &Ladder::default());
        assert_eq!(crossed, BTreeSet::from([3, 4]));
        assert!(store.evaluate("unknown", 450.0, &Ladder::default()).is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let store = TrackerStore::new(EvictionPolicy::unbounded().with_max_entries(2));
        store.try_insert("a", 1.0, "a", "a");
        store.try_insert("b", 1.0, "b", "b");
        store.try_insert("c", 1.0, "c", "c");

        assert_eq!(store.ids(), vec!["b", "c"]);
        assert!(!store.contains("a"));
        assert_eq!(store.policy().max_entries, Some(2));
    }

    #[test]
    fn test_evict_expired() {
        let store = TrackerStore::new(
            EvictionPolicy::unbounded().with_max_age(Duration::from_secs(3600)),
        );
        let now = Utc::now();
        store.try_insert_at("old", 1.0, "old", "OLD", now - chrono::Duration::hours(2));
        store.try_insert_at("new", 1.0, "new", "NEW", now - chrono::Duration::minutes(5));

        let evicted = store.evict_expired(now);
        assert_eq!(evicted, vec!["old"]);
        assert_eq!(store.ids(), vec!["new"]);
    }

    #[test]
    fn test_evict_expired_without_policy() {
        let store = TrackerStore::default();
        store.try_insert_at("old", 1.0, "old", "OLD", Utc::now() - chrono::Duration::days(30));
        assert!(store.evict_expired(Utc::now()).is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_insert_single_winner() {
        let store = Arc::new(TrackerStore::default());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    store.try_insert("mint1", 100.0, "Gem", "GEM")
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_evaluate_no_double_fire() {
        for _ in 0..50 {
            let store = Arc::new(TrackerStore::default());
            store.try_insert("mint1", 100.0, "Gem", "GEM");
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let store = Arc::clone(&store);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        store.evaluate("mint1", 250.0, &Ladder::default())
                    })
                })
                .collect();

            let results: Vec<BTreeSet<u32>> =
                handles.into_iter().map(|h| h.join().unwrap()).collect();
            let with_two = results.iter().filter(|c| c.contains(&2)).count();
            assert_eq!(with_two, 1);
        }
    }
}
