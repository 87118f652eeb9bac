use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::{Mutex, MutexGuard};
use slotmap::Key;

use crate::adb::pool::EntityPool;

/// One shard of the address database's sharded store.
/// Every name or endpoint hashes to exactly one bucket; the bucket's own
/// mutex is the only lock ever held while touching its entries.
///
/// `internal_refs` is the bucket-level reference count from §5: one for the
/// bucket's own existence plus one for every outstanding cleanup op
/// currently walking it. It is a plain atomic rather than a second mutex —
/// incrementing and decrementing it never needs to observe the bucket's
/// contents, so there is nothing for a second lock to protect.
pub struct Bucket<K: Key, V> {
    entries: Mutex<BucketEntries<K, V>>,
    internal_refs: AtomicI64,
}

pub struct BucketEntries<K: Key, V> {
    pub pool: EntityPool<K, V>,
    pub index: HashMap<String, K>,
}

impl<K: Key, V> Bucket<K, V> {
    fn new(free_items: usize, fill_count: usize) -> Self {
        Self {
            entries: Mutex::new(BucketEntries {
                pool: EntityPool::new(free_items, fill_count),
                index: HashMap::new(),
            }),
            internal_refs: AtomicI64::new(1),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, BucketEntries<K, V>> {
        self.entries.lock()
    }

    /// One more cleanup op (or other long-lived holder) is now interested
    /// in this bucket outliving the current operation.
    pub fn hold(&self) {
        self.internal_refs.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns the refcount after release. Zero means nothing beyond the
    /// bucket's own baseline reference is pinning it — callers use this to
    /// decide whether a deferred free can proceed.
    pub fn release(&self) -> i64 {
        self.internal_refs.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn refs(&self) -> i64 {
        self.internal_refs.load(Ordering::Acquire)
    }
}

pub fn new_buckets<K: Key, V>(n: usize, free_items: usize, fill_count: usize) -> Vec<Bucket<K, V>> {
    (0..n).map(|_| Bucket::new(free_items, fill_count)).collect()
}
