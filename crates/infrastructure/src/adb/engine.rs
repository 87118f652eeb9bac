use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use ferrous_adb_application::{AddrInfoHandle, AddressDatabasePort, CreateFindResponse, FetchPort, LocalLookupPort};
use ferrous_adb_domain::{AdbConfig, AdbError, CompletionEvent, EndpointFlags, EndpointKey, FindKey, FindOptions};
use parking_lot::Mutex;
use slotmap::SlotMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tracing::debug;

use crate::adb::bucket::{new_buckets, Bucket};
use crate::adb::endpoint::EndpointEntry;
use crate::adb::find::FindEntry;
use crate::adb::hashing::{endpoint_bucket, name_bucket};
use crate::adb::name::{EndpointRef, NameEntry};

/// The address database engine: a sharded, reference-counted cache of
/// name-to-address knowledge sitting in front of a real resolver.
pub struct Adb {
    pub(crate) config: AdbConfig,
    pub(crate) name_buckets: Vec<Bucket<ferrous_adb_domain::NameKey, NameEntry>>,
    pub(crate) endpoint_buckets: Vec<Bucket<EndpointKey, EndpointEntry>>,
    pub(crate) finds: Mutex<SlotMap<FindKey, FindEntry>>,
    pub(crate) active_fetches: Mutex<SlotMap<ferrous_adb_domain::FetchKey, AbortHandle>>,
    pub(crate) external_refs: AtomicI64,
    pub(crate) shutting_down: AtomicBool,
    pub(crate) shutdown_waiters: Mutex<Vec<oneshot::Sender<()>>>,
    pub(crate) local_lookup: Arc<dyn LocalLookupPort>,
    pub(crate) fetcher: Arc<dyn FetchPort>,
    /// Lets a fetch task started from inside `&self` obtain its own strong
    /// reference to the engine it needs to outlive the call that spawned it.
    pub(crate) weak_self: Weak<Adb>,
}

impl Adb {
    pub fn new(
        config: AdbConfig,
        local_lookup: Arc<dyn LocalLookupPort>,
        fetcher: Arc<dyn FetchPort>,
    ) -> Arc<Self> {
        let nbuckets = config.nbuckets;
        let free_items = config.pool_free_items;
        let fill_count = config.pool_fill_count;
        Arc::new_cyclic(|weak| Self {
            config,
            name_buckets: new_buckets(nbuckets, free_items, fill_count),
            endpoint_buckets: new_buckets(nbuckets, free_items, fill_count),
            finds: Mutex::new(SlotMap::with_key()),
            active_fetches: Mutex::new(SlotMap::with_key()),
            external_refs: AtomicI64::new(1),
            shutting_down: AtomicBool::new(false),
            shutdown_waiters: Mutex::new(Vec::new()),
            local_lookup,
            fetcher,
            weak_self: weak.clone(),
        })
    }

    pub(crate) fn name_bucket_for(&self, name: &str) -> &Bucket<ferrous_adb_domain::NameKey, NameEntry> {
        &self.name_buckets[name_bucket(name, self.name_buckets.len())]
    }

    pub(crate) fn endpoint_bucket_for(&self, addr: SocketAddr) -> &Bucket<EndpointKey, EndpointEntry> {
        &self.endpoint_buckets[endpoint_bucket(addr, self.endpoint_buckets.len())]
    }

    /// Total live references: external callers plus every bucket's own
    /// baseline. Quiescence is "shutting down and this reaches zero".
    fn is_quiescent(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire) && self.external_refs.load(Ordering::Acquire) <= 0
    }

    fn notify_if_quiescent(&self) {
        if self.is_quiescent() {
            let mut waiters = self.shutdown_waiters.lock();
            for tx in waiters.drain(..) {
                let _ = tx.send(());
            }
        }
    }

    pub(crate) fn get_or_insert_endpoint(&self, addr: SocketAddr, now: i64) -> EndpointRef {
        let bucket_idx = endpoint_bucket(addr, self.endpoint_buckets.len());
        let bucket = &self.endpoint_buckets[bucket_idx];
        let mut entries = bucket.lock();
        let key = entries.index.get(&addr.to_string()).copied();
        let key = if let Some(key) = key {
            key
        } else {
            let key = entries.pool.insert(EndpointEntry::new(addr, now));
            entries.index.insert(addr.to_string(), key);
            key
        };
        EndpointRef { bucket: bucket_idx, key }
    }

    /// Credits one `NameHook`'s worth of reference to each endpoint in
    /// `refs`, the inverse of `release_hook_refs`. Called once per newly
    /// created hook, whether the endpoint was just created by the same
    /// import or already existed from some other name's hook.
    pub(crate) fn acquire_hook_refs(&self, refs: &[EndpointRef]) {
        for eref in refs {
            let bucket = &self.endpoint_buckets[eref.bucket];
            let mut entries = bucket.lock();
            if let Some(e) = entries.pool.get_mut(eref.key) {
                e.refs += 1;
                e.expire_at = None;
            }
        }
    }

    /// Releases one `NameHook`'s worth of reference on each endpoint in
    /// `refs` (BIND9's `dec_entry_refcnt`). An endpoint whose refcount
    /// reaches zero here is marked immediately eligible for collection —
    /// the hooks that held it are gone, so there is nothing left pinning
    /// it except a possible `AddrInfo`, which is tracked by the same
    /// refcount and would have kept it above zero.
    pub(crate) fn release_hook_refs(&self, refs: &[EndpointRef]) {
        for eref in refs {
            let bucket = &self.endpoint_buckets[eref.bucket];
            let mut entries = bucket.lock();
            if let Some(e) = entries.pool.get_mut(eref.key) {
                e.refs -= 1;
                if e.refs <= 0 {
                    e.expire_at = Some(i64::MIN);
                }
            }
        }
    }

    /// Frees endpoints in `bucket` whose refcount is already zero; used on
    /// shutdown, where an endpoint with no references left is collected
    /// immediately rather than waiting for its `expire_at` (BIND9's
    /// `shutdown_entries` does the same when the bucket holds no more live
    /// references).
    fn reap_unreferenced_endpoints(bucket: &Bucket<EndpointKey, EndpointEntry>) {
        let mut entries = bucket.lock();
        let dead: Vec<EndpointKey> = entries
            .pool
            .iter()
            .filter(|(_, e)| e.refs <= 0)
            .map(|(k, _)| k)
            .collect();
        for key in dead {
            if let Some(e) = entries.pool.remove(key) {
                entries.index.remove(&e.address.to_string());
            }
        }
    }
}

#[async_trait]
impl AddressDatabasePort for Adb {
    fn attach(&self) {
        self.external_refs.fetch_add(1, Ordering::AcqRel);
    }

    fn detach(&self) {
        self.external_refs.fetch_sub(1, Ordering::AcqRel);
        self.notify_if_quiescent();
    }

    fn when_shutdown(&self, event: oneshot::Sender<()>) {
        if self.is_quiescent() {
            let _ = event.send(());
            return;
        }
        self.shutdown_waiters.lock().push(event);
    }

    fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("address database shutting down");

        // Outstanding fetches carry no continuation to run after abort, so
        // cancelling one here stands in for "the cancel callback returns
        // through the normal path" (§4.6): the name it was keeping alive is
        // torn down in the same pass below rather than waiting on a
        // callback that will never fire.
        let mut active = self.active_fetches.lock();
        for (_, handle) in active.drain() {
            handle.abort();
        }
        drop(active);

        let mut finds = self.finds.lock();
        for (_, find) in finds.iter_mut() {
            find.deliver(CompletionEvent::Shutdown);
        }
        drop(finds);

        for bucket in &self.name_buckets {
            let removed: Vec<NameEntry> = {
                let mut entries = bucket.lock();
                let keys: Vec<_> = entries.pool.iter().map(|(k, _)| k).collect();
                keys.into_iter()
                    .filter_map(|key| {
                        let entry = entries.pool.remove(key)?;
                        entries.index.remove(&entry.name);
                        Some(entry)
                    })
                    .collect()
            };
            for entry in &removed {
                self.release_hook_refs(&entry.v4);
                self.release_hook_refs(&entry.v6);
            }
            // Every name bucket is now empty; drop its one baseline
            // internal reference (§4.6 step 4).
            bucket.release();
        }

        for bucket in &self.endpoint_buckets {
            Self::reap_unreferenced_endpoints(bucket);
            if bucket.lock().pool.is_empty() {
                bucket.release();
            }
        }

        self.notify_if_quiescent();
    }

    async fn create_find(
        &self,
        name: &str,
        zone: &str,
        options: FindOptions,
        now: i64,
        event_tx: Option<mpsc::UnboundedSender<CompletionEvent>>,
    ) -> Result<CreateFindResponse, AdbError> {
        super::lookup::create_find(self, name, zone, options, now, event_tx).await
    }

    fn destroy_find(&self, find: FindKey) {
        let mut finds = self.finds.lock();
        finds.remove(find);
    }

    fn cancel_find(&self, find: FindKey) {
        // Unlink from the owning Name's pending list before delivering the
        // event: a find must never still be on a Name's waiting list at the
        // moment its completion event goes out. The name lookup and the
        // find lookup use separate locks taken one at a time, never nested,
        // so there is nothing to deadlock against.
        let owner = {
            let finds = self.finds.lock();
            finds.get(find).map(|entry| entry.name.clone())
        };
        if let Some(name) = owner {
            let bucket = self.name_bucket_for(&name);
            let mut entries = bucket.lock();
            if let Some(e) = entries.index.get(&name).and_then(|k| entries.pool.get_mut(*k)) {
                e.waiting_finds.retain(|&k| k != find);
            }
        }

        let mut finds = self.finds.lock();
        if let Some(entry) = finds.get_mut(find) {
            entry.canceled = true;
            entry.deliver(CompletionEvent::Canceled);
        }
    }

    fn delete_name(&self, name: &str) {
        let bucket = self.name_bucket_for(name);
        let removed = {
            let mut entries = bucket.lock();
            entries.index.remove(name).and_then(|key| entries.pool.remove(key))
        };
        if let Some(entry) = removed {
            self.release_hook_refs(&entry.v4);
            self.release_hook_refs(&entry.v6);
        }
    }

    fn insert(&self, name: &str, addr: SocketAddr, ttl: u32, now: i64) -> Result<(), AdbError> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(AdbError::ShuttingDown);
        }
        let endpoint = self.get_or_insert_endpoint(addr, now);
        {
            let ebucket = &self.endpoint_buckets[endpoint.bucket];
            let mut eentries = ebucket.lock();
            if let Some(e) = eentries.pool.get_mut(endpoint.key) {
                e.refs += 1;
            }
        }
        let ttl = ttl.max(self.config.cache_floor_secs);
        let nbucket = self.name_bucket_for(name);
        let mut nentries = nbucket.lock();
        let key = *nentries
            .index
            .entry(name.to_string())
            .or_insert_with(|| nentries.pool.insert(NameEntry::new(name.to_string(), String::new(), now)));
        let entry = nentries.pool.get_mut(key).ok_or_else(|| AdbError::Internal("name vanished".into()))?;
        if addr.is_ipv4() {
            entry.v4.push(endpoint);
            entry.expire_v4 = Some(now + ttl as i64);
        } else {
            entry.v6.push(endpoint);
            entry.expire_v6 = Some(now + ttl as i64);
        }
        Ok(())
    }

    fn find_addr_info(&self, addr: SocketAddr, now: i64) -> AddrInfoHandle {
        let endpoint = self.get_or_insert_endpoint(addr, now);
        let bucket = &self.endpoint_buckets[endpoint.bucket];
        let mut entries = bucket.lock();
        let e = entries.pool.get_mut(endpoint.key).expect("just inserted");
        e.refs += 1;
        e.expire_at = None;
        AddrInfoHandle { entry: endpoint.key, snapshot: e.snapshot() }
    }

    fn free_addr_info(&self, info: AddrInfoHandle, now: i64) {
        let bucket = self.endpoint_bucket_for(info.snapshot.address);
        let mut entries = bucket.lock();
        if let Some(e) = entries.pool.get_mut(info.entry) {
            e.refs -= 1;
            if e.refs <= 0 {
                e.expire_at = Some(now + self.config.freed_addrinfo_ttl_secs as i64);
            }
        }
    }

    fn mark_lame(&self, info: &AddrInfoHandle, zone: &str, until: i64) {
        let bucket = self.endpoint_bucket_for(info.snapshot.address);
        let mut entries = bucket.lock();
        if let Some(e) = entries.pool.get_mut(info.entry) {
            e.mark_lame(zone, until);
        }
    }

    fn adjust_goodness(&self, info: &AddrInfoHandle, delta: i32) {
        let bucket = self.endpoint_bucket_for(info.snapshot.address);
        let mut entries = bucket.lock();
        if let Some(e) = entries.pool.get_mut(info.entry) {
            e.adjust_goodness(delta);
        }
    }

    fn adjust_srtt(&self, info: &AddrInfoHandle, rtt: u32, factor: u8) {
        let bucket = self.endpoint_bucket_for(info.snapshot.address);
        let mut entries = bucket.lock();
        if let Some(e) = entries.pool.get_mut(info.entry) {
            e.adjust_srtt(rtt, factor);
        }
    }

    fn change_flags(&self, info: &AddrInfoHandle, bits: EndpointFlags, mask: EndpointFlags) {
        let bucket = self.endpoint_bucket_for(info.snapshot.address);
        let mut entries = bucket.lock();
        if let Some(e) = entries.pool.get_mut(info.entry) {
            e.flags = e.flags.apply(bits, mask);
        }
    }

    fn dump(&self) -> String {
        let mut out = String::new();
        for (i, bucket) in self.name_buckets.iter().enumerate() {
            let entries = bucket.lock();
            for (_, name) in entries.pool.iter() {
                out.push_str(&format!(
                    "name bucket={i} name={} zone={} v4={} v6={} alias={:?}\n",
                    name.name,
                    name.zone,
                    name.v4.len(),
                    name.v6.len(),
                    name.alias,
                ));
            }
        }
        for (i, bucket) in self.endpoint_buckets.iter().enumerate() {
            let entries = bucket.lock();
            for (_, endpoint) in entries.pool.iter() {
                out.push_str(&format!(
                    "endpoint bucket={i} addr={} goodness={} srtt={} refs={}\n",
                    endpoint.address, endpoint.goodness, endpoint.srtt, endpoint.refs,
                ));
            }
        }
        out
    }
}

#[allow(dead_code)]
fn _assert_send_sync() {
    fn check<T: Send + Sync>() {}
    check::<Adb>();
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullLookup;
    #[async_trait]
    impl LocalLookupPort for NullLookup {
        async fn lookup(
            &self,
            _name: &str,
            _kind: ferrous_adb_domain::RecordKind,
            _now: i64,
            _options: FindOptions,
        ) -> ferrous_adb_domain::LocalLookupResult {
            ferrous_adb_domain::LocalLookupResult {
                status: ferrous_adb_domain::LocalLookupStatus::NotFound,
                rdataset: None,
            }
        }
    }

    struct NullFetch;
    #[async_trait]
    impl FetchPort for NullFetch {
        async fn fetch(
            &self,
            _request: ferrous_adb_application::FetchRequest,
        ) -> ferrous_adb_application::FetchOutcome {
            ferrous_adb_application::FetchOutcome::Failure
        }
    }

    fn test_adb() -> Arc<Adb> {
        Adb::new(AdbConfig::default(), Arc::new(NullLookup), Arc::new(NullFetch))
    }

    #[test]
    fn attach_detach_tracks_external_refs() {
        let adb = test_adb();
        assert_eq!(adb.external_refs.load(Ordering::Acquire), 1);
        adb.attach();
        assert_eq!(adb.external_refs.load(Ordering::Acquire), 2);
        adb.detach();
        adb.detach();
        assert_eq!(adb.external_refs.load(Ordering::Acquire), 0);
    }

    #[test]
    fn insert_then_find_addr_info_shares_the_same_endpoint() {
        let adb = test_adb();
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        adb.insert("example.com", addr, 300, 1000).unwrap();
        let handle = adb.find_addr_info(addr, 1000);
        assert_eq!(handle.snapshot.address, addr);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let adb = test_adb();
        adb.shutdown();
        adb.shutdown();
    }

    #[tokio::test]
    async fn cancel_find_unlinks_from_its_name_before_delivering() {
        let adb = test_adb();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let response = adb
            .create_find(
                "pending.example.",
                "example.",
                FindOptions::INET | FindOptions::WANT_EVENT,
                1000,
                Some(tx),
            )
            .await
            .unwrap();
        assert!(response.event_armed);

        adb.cancel_find(response.find);

        let event = rx.recv().await.expect("cancel delivers an event");
        assert!(matches!(event, CompletionEvent::Canceled));

        let bucket = adb.name_bucket_for("pending.example.");
        let entries = bucket.lock();
        let key = entries.index.get("pending.example.").copied().expect("name still exists");
        let entry = entries.pool.get(key).expect("name entry still live");
        assert!(!entry.waiting_finds.contains(&response.find));
    }
}
