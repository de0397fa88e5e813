//! Lock-free multi-producer clustering map.

use std::hash::Hash;
use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use dashmap::DashMap;

use crate::sequence::Sequence;

type Slot<V> = Arc<ArcSwap<Sequence<V>>>;

/// Maps a discriminator key to the [`Sequence`] of values sharing it.
///
/// Every key owns an atomically swappable reference to its current
/// sequence. Writers never mutate a published sequence: they build a new
/// version on top of the one they observed and publish it with a
/// compare-and-swap, retrying against the fresh head when another writer
/// got there first. Readers always observe a complete sequence reflecting
/// some prefix of the insertion history for that key.
///
/// The key index itself is a sharded [`DashMap`]; a shard is only locked
/// long enough to look up or create a slot, never while a sequence is
/// being extended.
pub struct ClusterMap<K, V> {
    slots: DashMap<K, Slot<V>>,
}

impl<K, V> ClusterMap<K, V>
where
    K: Eq + Hash,
{
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Add `value` to the cluster for `key`.
    ///
    /// Safe to call from any number of threads at once, for the same or
    /// different keys. Returns the number of compare-and-swap attempts it
    /// took to publish the new sequence.
    pub fn add_grouped_element(&self, key: K, value: V) -> usize
    where
        V: Clone,
    {
        let slot = self.slot(key);
        let mut current = slot.load_full();
        let mut attempts = 1;

        loop {
            let candidate = Arc::new(current.add(value.clone()));
            let previous = slot.compare_and_swap(&current, candidate);
            if Arc::ptr_eq(&previous, &current) {
                return attempts;
            }
            current = Guard::into_inner(previous);
            attempts += 1;
        }
    }

    /// Copy of this map keeping only clusters with more than one value.
    ///
    /// Intended to run after every writer has finished. The copy holds
    /// snapshots, so writers still running cannot change it.
    pub fn remove_uniques(&self) -> Self
    where
        K: Clone,
    {
        let slots = DashMap::new();
        for entry in self.slots.iter() {
            let sequence = entry.value().load_full();
            if sequence.len() > 1 {
                slots.insert(entry.key().clone(), Arc::new(ArcSwap::new(sequence)));
            }
        }
        Self { slots }
    }

    /// Snapshot of the cluster for `key`.
    pub fn get(&self, key: &K) -> Option<Sequence<V>> {
        self.slots
            .get(key)
            .map(|slot| Sequence::clone(&slot.load()))
    }

    /// Check whether a cluster exists for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the map holds no clusters.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total number of values across all clusters.
    pub fn member_count(&self) -> usize {
        self.slots.iter().map(|slot| slot.load().len()).sum()
    }

    /// Iterate over `(key, snapshot)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (K, Sequence<V>)> + '_
    where
        K: Clone,
    {
        self.slots
            .iter()
            .map(|entry| (entry.key().clone(), Sequence::clone(&entry.value().load())))
    }

    /// Keys currently present, in no particular order.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.slots.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Consume the map into clusters sorted by key.
    pub fn into_clusters(self) -> Vec<(K, Sequence<V>)>
    where
        K: Ord,
    {
        let mut clusters: Vec<_> = self
            .slots
            .into_iter()
            .map(|(key, slot)| (key, Sequence::clone(&slot.load())))
            .collect();
        clusters.sort_by(|a, b| a.0.cmp(&b.0));
        clusters
    }

    fn slot(&self, key: K) -> Slot<V> {
        if let Some(slot) = self.slots.get(&key) {
            return Arc::clone(slot.value());
        }
        Arc::clone(
            self.slots
                .entry(key)
                .or_insert_with(|| Arc::new(ArcSwap::from_pointee(Sequence::empty())))
                .value(),
        )
    }
}

impl<K, V> Default for ClusterMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for ClusterMap<K, V>
where
    K: Eq + Hash + std::fmt::Debug,
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for entry in self.slots.iter() {
            map.entry(entry.key(), &**entry.value().load());
        }
        map.finish()
    }
}
