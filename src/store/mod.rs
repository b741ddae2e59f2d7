//! Key-value counter stores.
//!
//! The rate limiter only needs a handful of operations, most importantly an
//! atomic increment with a time-to-live, so that is all the
//! [`CounterStore`] trait asks for. Two backends ship with the crate:
//!
//! - [`MemoryStore`]: one mutex-guarded map, private to its owner.
//! - [`SharedStore`]: a process-wide concurrent map split into prefixed
//!   namespaces, so several components can share one backing store without
//!   seeing each other's keys.
//!
//! A TTL of `0` means "never expires". An entry whose expiry time is at or
//! before the current time no longer exists.

mod memory;
mod shared;

pub use memory::MemoryStore;
pub use shared::SharedStore;

/// The store interface consumed by [`RateLimit`](crate::middleware::RateLimit).
pub trait CounterStore: Send + Sync + 'static {
    /// The stored value, or `default` when the key is absent or expired.
    fn get(&self, key: &str, default: i64) -> i64;

    /// Stores `value`, replacing any previous entry and its expiry.
    fn set(&self, key: &str, value: i64, ttl_secs: u64);

    fn has(&self, key: &str) -> bool;

    /// Adds one and returns the new value.
    ///
    /// Atomic with respect to every other operation on the same store. The
    /// TTL only applies when the increment creates the entry; later
    /// increments keep the original expiry.
    fn increment(&self, key: &str, ttl_secs: u64) -> i64;

    fn delete(&self, key: &str);

    /// Removes every entry visible through this store.
    fn clear(&self);
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    value: i64,
    /// Unix seconds; `0` never expires.
    expires_at: u64,
}

impl Entry {
    fn new(value: i64, now: u64, ttl_secs: u64) -> Self {
        let expires_at = if ttl_secs > 0 { now.saturating_add(ttl_secs) } else { 0 };
        Self { value, expires_at }
    }

    fn is_expired(&self, now: u64) -> bool {
        self.expires_at > 0 && self.expires_at <= now
    }
}

fn prefixed(prefix: &str, key: &str) -> String {
    if prefix.is_empty() { key.to_owned() } else { format!("{prefix}:{key}") }
}
