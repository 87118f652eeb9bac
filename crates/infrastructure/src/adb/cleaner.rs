use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::adb::engine::Adb;

/// The address database's own incremental cleaner: each tick visits one
/// name bucket and one endpoint bucket, expiring anything past its TTL and
/// with no outstanding reference. Running one bucket at a time means no
/// single tick ever holds a bucket's lock for longer than a handful of
/// entries.
pub struct AdbCleaner {
    adb: Arc<Adb>,
    next_name_bucket: std::sync::atomic::AtomicUsize,
    next_endpoint_bucket: std::sync::atomic::AtomicUsize,
}

impl AdbCleaner {
    pub fn new(adb: Arc<Adb>) -> Self {
        Self {
            adb,
            next_name_bucket: std::sync::atomic::AtomicUsize::new(0),
            next_endpoint_bucket: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.adb.config.clean_interval_secs.max(1) as u64)
    }

    /// Visit the next name bucket and the next endpoint bucket, in that
    /// order. Returns the number of entries reaped.
    pub fn tick(&self, now: i64) -> usize {
        let mut reaped = 0;
        reaped += self.sweep_name_bucket(now);
        reaped += self.sweep_endpoint_bucket(now);
        reaped
    }

    fn sweep_name_bucket(&self, now: i64) -> usize {
        use std::sync::atomic::Ordering;
        let idx = self
            .next_name_bucket
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| {
                Some((i + 1) % self.adb.name_buckets.len())
            })
            .unwrap();
        let bucket = &self.adb.name_buckets[idx];
        bucket.hold();
        let mut entries = bucket.lock();
        let dead: Vec<String> = entries
            .pool
            .iter()
            .filter(|(_, n)| n.is_expired(now))
            .map(|(_, n)| n.name.clone())
            .collect();
        let count = dead.len();
        let mut removed = Vec::with_capacity(count);
        for name in &dead {
            if let Some(key) = entries.index.remove(name) {
                if let Some(entry) = entries.pool.remove(key) {
                    removed.push(entry);
                }
            }
        }
        drop(entries);
        bucket.release();
        for entry in &removed {
            self.adb.release_hook_refs(&entry.v4);
            self.adb.release_hook_refs(&entry.v6);
        }
        if count > 0 {
            trace!(bucket = idx, count, "reaped expired names");
        }
        count
    }

    fn sweep_endpoint_bucket(&self, now: i64) -> usize {
        use std::sync::atomic::Ordering;
        let idx = self
            .next_endpoint_bucket
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| {
                Some((i + 1) % self.adb.endpoint_buckets.len())
            })
            .unwrap();
        let bucket = &self.adb.endpoint_buckets[idx];
        bucket.hold();
        let mut entries = bucket.lock();
        let dead: Vec<std::net::SocketAddr> = entries
            .pool
            .iter()
            .filter(|(_, e)| e.refs <= 0 && e.expire_at.map(|t| t <= now).unwrap_or(false))
            .map(|(_, e)| e.address)
            .collect();
        let count = dead.len();
        for addr in &dead {
            if let Some(key) = entries.index.remove(&addr.to_string()) {
                entries.pool.remove(key);
            }
        }
        drop(entries);
        bucket.release();
        if count > 0 {
            trace!(bucket = idx, count, "reaped expired endpoints");
        }
        count
    }

    /// Runs `tick` on `tick_interval()` until the engine is shut down.
    /// Intended to be the body of a dedicated `tokio::spawn`ed task.
    pub async fn run(self: Arc<Self>, now_fn: impl Fn() -> i64 + Send + Sync + 'static) {
        let mut ticker = tokio::time::interval(self.tick_interval());
        loop {
            ticker.tick().await;
            if self
                .adb
                .shutting_down
                .load(std::sync::atomic::Ordering::Acquire)
            {
                break;
            }
            self.tick(now_fn());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrous_adb_domain::AdbConfig;

    struct NullLookup;
    #[async_trait::async_trait]
    impl ferrous_adb_application::LocalLookupPort for NullLookup {
        async fn lookup(
            &self,
            _name: &str,
            _kind: ferrous_adb_domain::RecordKind,
            _now: i64,
            _options: ferrous_adb_domain::FindOptions,
        ) -> ferrous_adb_domain::LocalLookupResult {
            ferrous_adb_domain::LocalLookupResult { status: ferrous_adb_domain::LocalLookupStatus::NotFound, rdataset: None }
        }
    }

    struct NullFetch;
    #[async_trait::async_trait]
    impl ferrous_adb_application::FetchPort for NullFetch {
        async fn fetch(&self, _r: ferrous_adb_application::FetchRequest) -> ferrous_adb_application::FetchOutcome {
            ferrous_adb_application::FetchOutcome::Failure
        }
    }

    #[test]
    fn sweeps_expired_names_after_a_full_cycle() {
        use ferrous_adb_application::AddressDatabasePort;
        let adb = Adb::new(AdbConfig::default(), Arc::new(NullLookup), Arc::new(NullFetch));
        let addr: std::net::SocketAddr = "10.0.0.1:0".parse().unwrap();
        adb.insert("stale.example.", addr, 10, 0).unwrap();

        let cleaner = AdbCleaner::new(Arc::clone(&adb));
        let mut total_reaped = 0;
        // One full cycle touches every bucket exactly once.
        for _ in 0..adb.name_buckets.len() {
            total_reaped += cleaner.tick(100_000);
        }
        assert_eq!(total_reaped, 1);

        let bucket = adb.name_bucket_for("stale.example.");
        assert!(bucket.lock().index.get("stale.example.").is_none());
    }
}
