use std::sync::Arc;

use dashmap::DashMap;

use super::{CounterStore, Entry, prefixed};
use crate::clock::{SharedClock, SystemClock};

/// Process-wide concurrent store, partitioned into prefixed namespaces.
///
/// Every namespace obtained from the same root shares one backing map.
/// [`clear`](CounterStore::clear) only removes the calling namespace's keys.
///
/// ```rust
/// use sluice::store::{CounterStore, SharedStore};
///
/// let root = SharedStore::new();
/// let hits = root.namespace("rate-limit");
/// let other = root.namespace("sessions");
///
/// hits.increment("client", 60);
/// other.clear();
/// assert_eq!(hits.get("client", 0), 1);
/// ```
#[derive(Clone)]
pub struct SharedStore {
    prefix: String,
    clock: SharedClock,
    entries: Arc<DashMap<String, Entry>>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self { prefix: String::new(), clock, entries: Arc::new(DashMap::new()) }
    }

    /// A view over the same backing map under `prefix`.
    pub fn namespace(&self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            clock: Arc::clone(&self.clock),
            entries: Arc::clone(&self.entries),
        }
    }

    /// Drops expired entries across every namespace.
    pub fn purge_expired(&self) {
        let now = self.clock.now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }

    fn key(&self, key: &str) -> String {
        prefixed(&self.prefix, key)
    }

    fn live(&self, key: &str) -> Option<Entry> {
        let now = self.clock.now();
        self.entries
            .get(&self.key(key))
            .map(|entry| *entry)
            .filter(|entry| !entry.is_expired(now))
    }
}

impl Default for SharedStore {
    fn default() -> Self { Self::new() }
}

impl CounterStore for SharedStore {
    fn get(&self, key: &str, default: i64) -> i64 {
        self.live(key).map_or(default, |e| e.value)
    }

    fn set(&self, key: &str, value: i64, ttl_secs: u64) {
        let now = self.clock.now();
        self.entries.insert(self.key(key), Entry::new(value, now, ttl_secs));
    }

    fn has(&self, key: &str) -> bool {
        self.live(key).is_some()
    }

    fn increment(&self, key: &str, ttl_secs: u64) -> i64 {
        let now = self.clock.now();
        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut entry = self.entries
            .entry(self.key(key))
            .or_insert_with(|| Entry::new(0, now, ttl_secs));
        if entry.is_expired(now) {
            *entry = Entry::new(0, now, ttl_secs);
        }
        entry.value += 1;
        entry.value
    }

    fn delete(&self, key: &str) {
        self.entries.remove(&self.key(key));
    }

    fn clear(&self) {
        if self.prefix.is_empty() {
            self.entries.clear();
            return;
        }
        let own = format!("{}:", self.prefix);
        self.entries.retain(|key, _| !key.starts_with(&own));
    }
}
