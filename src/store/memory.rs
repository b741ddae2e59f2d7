use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{CounterStore, Entry, prefixed};
use crate::clock::{SharedClock, SystemClock};

/// In-process store backed by a single mutex-guarded map.
///
/// Expired entries are swept on every access, so the map never holds more
/// than the live working set plus whatever expired since the last call.
pub struct MemoryStore {
    prefix: String,
    clock: SharedClock,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self { prefix: String::new(), clock, entries: Mutex::new(HashMap::new()) }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn live(&self) -> (MutexGuard<'_, HashMap<String, Entry>>, u64) {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, entry| !entry.is_expired(now));
        (entries, now)
    }
}

impl Default for MemoryStore {
    fn default() -> Self { Self::new() }
}

impl CounterStore for MemoryStore {
    fn get(&self, key: &str, default: i64) -> i64 {
        let (entries, _) = self.live();
        entries.get(&prefixed(&self.prefix, key)).map_or(default, |e| e.value)
    }

    fn set(&self, key: &str, value: i64, ttl_secs: u64) {
        let (mut entries, now) = self.live();
        entries.insert(prefixed(&self.prefix, key), Entry::new(value, now, ttl_secs));
    }

    fn has(&self, key: &str) -> bool {
        let (entries, _) = self.live();
        entries.contains_key(&prefixed(&self.prefix, key))
    }

    fn increment(&self, key: &str, ttl_secs: u64) -> i64 {
        let (mut entries, now) = self.live();
        let entry = entries
            .entry(prefixed(&self.prefix, key))
            .or_insert_with(|| Entry::new(0, now, ttl_secs));
        entry.value += 1;
        entry.value
    }

    fn delete(&self, key: &str) {
        let (mut entries, _) = self.live();
        entries.remove(&prefixed(&self.prefix, key));
    }

    fn clear(&self) {
        let (mut entries, _) = self.live();
        entries.clear();
    }
}
