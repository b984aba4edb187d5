//! Concurrent in-memory map whose entries expire a fixed TTL after insertion.

use std::hash::Hash;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// A cached value and the moment it was (re)inserted.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
}

/// Key → value map with per-entry expiry.
///
/// An entry older than `ttl` is absent for every read whether or not it has
/// been evicted yet. Updates to one key are atomic with respect to each
/// other.
#[derive(Debug)]
pub struct ExpiringCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_live(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        now - entry.inserted_at < self.ttl
    }

    /// Get a value if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Utc::now())
    }

    pub(crate) fn get_at(&self, key: &K, now: DateTime<Utc>) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) if self.is_live(&entry, now) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }
        self.entries.remove_if(key, |_, entry| !self.is_live(entry, now));
        None
    }

    /// Insert `value`, replacing whatever was there and restarting its TTL.
    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Utc::now(),
            },
        );
    }

    /// Atomically update a live entry in place, or insert a fresh one.
    ///
    /// `update` leaves the insertion time untouched, so repeated upserts never
    /// extend the entry's lifetime. Returns the resulting value.
    pub fn upsert(&self, key: K, insert: impl FnOnce() -> V, update: impl FnOnce(&mut V)) -> V {
        self.upsert_at(key, Utc::now(), insert, update)
    }

    pub(crate) fn upsert_at(
        &self,
        key: K,
        now: DateTime<Utc>,
        insert: impl FnOnce() -> V,
        update: impl FnOnce(&mut V),
    ) -> V {
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if self.is_live(occupied.get(), now) {
                    update(&mut occupied.get_mut().value);
                } else {
                    occupied.insert(CacheEntry {
                        value: insert(),
                        inserted_at: now,
                    });
                }
                occupied.get().value.clone()
            }
            Entry::Vacant(vacant) => {
                let value = insert();
                vacant.insert(CacheEntry {
                    value: value.clone(),
                    inserted_at: now,
                });
                value
            }
        }
    }

    /// Atomically update a live entry in place. Missing or expired entries
    /// are left alone and yield `None`.
    pub fn update(&self, key: &K, update: impl FnOnce(&mut V)) -> Option<V> {
        self.update_at(key, Utc::now(), update)
    }

    pub(crate) fn update_at(
        &self,
        key: &K,
        now: DateTime<Utc>,
        update: impl FnOnce(&mut V),
    ) -> Option<V> {
        let mut entry = self.entries.get_mut(key)?;
        if !self.is_live(&entry, now) {
            return None;
        }
        update(&mut entry.value);
        Some(entry.value.clone())
    }

    /// Remove an entry, returning its value if it was still live.
    pub fn remove(&self, key: &K) -> Option<V> {
        let now = Utc::now();
        self.entries
            .remove(key)
            .filter(|(_, entry)| self.is_live(entry, now))
            .map(|(_, entry)| entry.value)
    }

    /// Evict every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub(crate) fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| self.is_live(entry, now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_none_for_missing_key() {
        let cache: ExpiringCache<String, u32> = ExpiringCache::new(Duration::minutes(5));
        assert!(cache.get(&"unknown".to_string()).is_none());
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let cache = ExpiringCache::new(Duration::minutes(5));
        cache.insert("k1", 7);
        assert_eq!(cache.get(&"k1"), Some(7));
    }

    #[test]
    fn expired_entry_returns_none() {
        // TTL of 0 expires every entry immediately
        let cache = ExpiringCache::new(Duration::zero());
        cache.insert("k1", 7);
        assert!(cache.get(&"k1").is_none());
    }

    #[test]
    fn reading_an_expired_entry_evicts_it() {
        let cache = ExpiringCache::new(Duration::minutes(5));
        cache.insert("k1", 7);
        let later = Utc::now() + Duration::minutes(6);
        assert!(cache.get_at(&"k1", later).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn upsert_keeps_insertion_time() {
        let cache = ExpiringCache::new(Duration::minutes(5));
        let start = Utc::now();
        cache.upsert_at("k1", start, || 1, |v| *v += 1);
        cache.upsert_at("k1", start + Duration::minutes(4), || 1, |v| *v += 1);
        assert_eq!(cache.get_at(&"k1", start + Duration::minutes(4)), Some(2));
        // still anchored to the first insertion
        assert!(cache.get_at(&"k1", start + Duration::minutes(5)).is_none());
    }

    #[test]
    fn upsert_over_expired_entry_starts_fresh() {
        let cache = ExpiringCache::new(Duration::minutes(5));
        let start = Utc::now();
        cache.upsert_at("k1", start, || 1, |v| *v += 1);
        let value = cache.upsert_at("k1", start + Duration::minutes(10), || 1, |v| *v += 1);
        assert_eq!(value, 1);
    }

    #[test]
    fn update_touches_live_entries_only() {
        let cache = ExpiringCache::new(Duration::minutes(5));
        let start = Utc::now();
        assert_eq!(cache.update_at(&"k1", start, |v: &mut u32| *v += 1), None);
        assert!(cache.is_empty());

        cache.upsert_at("k1", start, || 1, |_| {});
        assert_eq!(cache.update_at(&"k1", start, |v| *v += 1), Some(2));
        assert_eq!(cache.update_at(&"k1", start + Duration::minutes(5), |v| *v += 1), None);
    }

    #[test]
    fn remove_returns_live_value_only() {
        let cache = ExpiringCache::new(Duration::minutes(5));
        cache.insert("k1", 7);
        assert_eq!(cache.remove(&"k1"), Some(7));
        assert_eq!(cache.remove(&"k1"), None);

        let expired = ExpiringCache::new(Duration::zero());
        expired.insert("k1", 7);
        assert_eq!(expired.remove(&"k1"), None);
        assert!(expired.is_empty());
    }

    #[test]
    fn purge_drops_only_expired_entries() {
        let cache = ExpiringCache::new(Duration::minutes(5));
        let start = Utc::now();
        cache.upsert_at("old", start - Duration::minutes(10), || 1, |_| {});
        cache.upsert_at("new", start, || 2, |_| {});
        assert_eq!(cache.purge_expired_at(start), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_at(&"new", start), Some(2));
    }
}
