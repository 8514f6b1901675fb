//! Access-order ledger for cache eviction.
//!
//! The ledger does not own cached values. It only records when each key was
//! last touched, using a monotonically increasing counter, and hands out the
//! least recently used key when a cache needs to shrink.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Tracks the access order of cache keys.
///
/// Every call to [`access`](LruLedger::access) stamps the key with the next
/// counter value. [`least_used`](LruLedger::least_used) returns the key with
/// the smallest stamp among the keys currently tracked.
///
/// Two indexes are kept in lockstep: `key -> stamp` for updates and
/// `stamp -> key` for ordered lookup, so both operations are logarithmic
/// rather than a linear scan over every key.
#[derive(Debug, Clone)]
pub struct LruLedger<K> {
    stamps: HashMap<K, u64>,
    order: BTreeMap<u64, K>,
    counter: u64,
}

impl<K> Default for LruLedger<K>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> LruLedger<K>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            stamps: HashMap::new(),
            order: BTreeMap::new(),
            counter: 0,
        }
    }

    /// Mark an access to `key`, making it the most recently used key.
    pub fn access(&mut self, key: &K) {
        if let Some(previous) = self.stamps.insert(key.clone(), self.counter) {
            self.order.remove(&previous);
        }
        self.order.insert(self.counter, key.clone());
        self.counter += 1;
    }

    /// Stop tracking `key`.
    ///
    /// Returns `true` if the key was tracked.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.stamps.remove(key) {
            Some(stamp) => {
                self.order.remove(&stamp);
                true
            }
            None => false,
        }
    }

    /// The least recently used key, or `None` if the ledger is empty.
    pub fn least_used(&self) -> Option<&K> {
        self.order.values().next()
    }

    /// Remove and return the least recently used key.
    pub fn pop_least_used(&mut self) -> Option<K> {
        let (_, key) = self.order.pop_first()?;
        self.stamps.remove(&key);
        Some(key)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    /// Whether `key` is tracked.
    pub fn contains(&self, key: &K) -> bool {
        self.stamps.contains_key(key)
    }

    /// The access stamp of `key`, if tracked.
    pub fn stamp(&self, key: &K) -> Option<u64> {
        self.stamps.get(key).copied()
    }

    /// Forget every key. The counter keeps increasing.
    pub fn clear(&mut self) {
        self.stamps.clear();
        self.order.clear();
    }
}
