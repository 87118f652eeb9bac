use std::collections::HashMap;

use parking_lot::Mutex;

/// One cached record plus its expiry, keyed by an opaque cache key (name +
/// type, already combined by the caller).
struct CachedRecord<V> {
    value: V,
    expire_at: i64,
}

/// A small sharded cache, independent of the address database's own name
/// store, for record sets the resolver wants to remember for reasons other
/// than address lookups (e.g. answers served straight off the wire path).
/// Sharded the same way the ADB's own buckets are, so its cleaner can make
/// the same "touch one shard per tick" guarantee.
pub struct RecordCache<V> {
    shards: Vec<Mutex<HashMap<String, CachedRecord<V>>>>,
}

impl<V: Clone> RecordCache<V> {
    pub fn new(nshards: usize) -> Self {
        Self {
            shards: (0..nshards.max(1)).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard_for(&self, key: &str) -> usize {
        use std::hash::{Hash, Hasher};
        let mut hasher = rustc_hash::FxHasher::default();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    pub fn get(&self, key: &str, now: i64) -> Option<V> {
        let shard = &self.shards[self.shard_for(key)];
        let guard = shard.lock();
        guard.get(key).filter(|r| r.expire_at > now).map(|r| r.value.clone())
    }

    pub fn put(&self, key: String, value: V, ttl: u32, now: i64) {
        let shard_idx = self.shard_for(&key);
        let mut guard = self.shards[shard_idx].lock();
        guard.insert(key, CachedRecord { value, expire_at: now + ttl as i64 });
    }

    pub fn remove(&self, key: &str) {
        let shard = &self.shards[self.shard_for(key)];
        shard.lock().remove(key);
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Expire everything past its TTL in one shard. Returns how many
    /// entries were dropped and how many remain cache-wide.
    pub(crate) fn sweep_shard(&self, idx: usize, now: i64) -> (usize, usize) {
        let mut guard = self.shards[idx].lock();
        let before = guard.len();
        guard.retain(|_, r| r.expire_at > now);
        let expired = before - guard.len();
        drop(guard);
        (expired, self.len())
    }
}
