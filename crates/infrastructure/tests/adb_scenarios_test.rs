use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ferrous_adb_application::{
    AddressDatabasePort, FetchOutcome, FetchPort, FetchRequest, LocalLookupPort,
};
use ferrous_adb_domain::{
    AdbConfig, CompletionEvent, FindOptions, LocalLookupResult, LocalLookupStatus, LookupOutcome,
    Rdata, RdataSet, RecordKind,
};
use ferrous_adb_infrastructure::Adb;
use tokio::sync::mpsc;

/// Hands back one fixed answer for whatever name is looked up, recording
/// every call it saw.
struct ScriptedLookup {
    status: LocalLookupStatus,
    rdataset: Option<RdataSet>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedLookup {
    fn new(status: LocalLookupStatus, rdataset: Option<RdataSet>) -> Self {
        Self { status, rdataset, calls: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl LocalLookupPort for ScriptedLookup {
    async fn lookup(
        &self,
        name: &str,
        _kind: RecordKind,
        _now: i64,
        _options: FindOptions,
    ) -> LocalLookupResult {
        self.calls.lock().unwrap().push(name.to_string());
        LocalLookupResult { status: self.status, rdataset: self.rdataset.clone() }
    }
}

/// A fetch port whose single outcome is handed out on the first call and
/// whose completion is gated by a channel, so a test can observe a fetch
/// "in flight" before letting it finish.
struct GatedFetch {
    outcome: Mutex<Option<FetchOutcome>>,
    gate: Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
}

impl GatedFetch {
    fn ungated(outcome: FetchOutcome) -> Self {
        Self { outcome: Mutex::new(Some(outcome)), gate: Mutex::new(None) }
    }
}

#[async_trait]
impl FetchPort for GatedFetch {
    async fn fetch(&self, _request: FetchRequest) -> FetchOutcome {
        if let Some(rx) = self.gate.lock().unwrap().take() {
            let _ = rx.await;
        }
        self.outcome.lock().unwrap().take().unwrap_or(FetchOutcome::Failure)
    }
}

fn addr(s: &str) -> SocketAddr {
    format!("{s}:0").parse().unwrap()
}

/// S1 — cold v4 lookup with a local hit returns both addresses with no
/// fetch armed and the name's v4 expiry floored/extended to now + ttl.
#[tokio::test]
async fn cold_v4_lookup_local_hit() {
    let rdataset = RdataSet::new(
        60,
        vec![Rdata::A("1.2.3.4".parse().unwrap()), Rdata::A("1.2.3.5".parse().unwrap())],
    );
    let lookup = Arc::new(ScriptedLookup::new(LocalLookupStatus::Success, Some(rdataset)));
    let fetch = Arc::new(GatedFetch::ungated(FetchOutcome::Failure));
    let adb = Adb::new(AdbConfig::default(), lookup, fetch);

    let response = adb
        .create_find("host.example.", "example.", FindOptions::INET, 1000, None)
        .await
        .unwrap();

    assert_eq!(response.outcome, LookupOutcome::Success);
    assert_eq!(response.addresses.len(), 2);
    assert!(!response.event_armed);

    let dump = adb.dump();
    assert!(dump.contains("host.example."));
    assert!(dump.contains("v4=2"));
}

/// S2 — a miss arms a fetch and the event fires exactly once with
/// `MoreAddresses` once the fetch completes.
#[tokio::test]
async fn cold_v4_lookup_miss_triggers_fetch_and_event() {
    let lookup = Arc::new(ScriptedLookup::new(LocalLookupStatus::NotFound, None));
    let rdataset = RdataSet::new(30, vec![Rdata::A("1.2.3.4".parse().unwrap())]);
    let fetch = Arc::new(GatedFetch::ungated(FetchOutcome::Success(rdataset)));
    let adb = Adb::new(AdbConfig::default(), lookup, fetch);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let response = adb
        .create_find(
            "host.example.",
            "example.",
            FindOptions::INET | FindOptions::WANT_EVENT,
            1000,
            Some(tx),
        )
        .await
        .unwrap();

    assert_eq!(response.outcome, LookupOutcome::Success);
    assert!(response.addresses.is_empty());
    assert!(response.event_armed);

    let event = rx.recv().await.expect("fetch completion delivers an event");
    assert!(matches!(event, CompletionEvent::MoreAddresses(_)));
    assert!(rx.try_recv().is_err(), "event must be delivered at most once");

    adb.destroy_find(response.find);

    let dump = adb.dump();
    assert!(dump.contains("refs=1"), "the hook still pins the endpoint after destroy_find: {dump}");
}

/// S3 — a negative cache entry short-circuits a second lookup within its
/// (floored) TTL: no new fetch, no event, expiry floored to at least 10s.
#[tokio::test]
async fn negative_cache_short_circuits_second_fetch() {
    let lookup = Arc::new(ScriptedLookup::new(
        LocalLookupStatus::NcacheNxrrset,
        Some(RdataSet::new(5, Vec::new())),
    ));
    let fetch = Arc::new(GatedFetch::ungated(FetchOutcome::Failure));
    let adb = Adb::new(AdbConfig::default(), Arc::clone(&lookup), fetch);

    let first = adb
        .create_find("nothing.example.", "example.", FindOptions::INET, 1000, None)
        .await
        .unwrap();
    assert_eq!(first.outcome, LookupOutcome::Success);
    assert!(first.addresses.is_empty());

    let second = adb
        .create_find("nothing.example.", "example.", FindOptions::INET, 1005, None)
        .await
        .unwrap();
    assert_eq!(second.outcome, LookupOutcome::Success);
    assert!(second.addresses.is_empty());
    assert!(!second.event_armed);

    // Only the first createFind should have consulted local-lookup; the
    // second must be served entirely from the still-fresh negative entry.
    assert_eq!(lookup.calls.lock().unwrap().len(), 1);
}

/// S4 — CNAME/DNAME resolution reports Alias with the target and starts no
/// fetch.
#[tokio::test]
async fn alias_reports_target_and_starts_no_fetch() {
    let rdataset = RdataSet::new(100, vec![Rdata::Cname("host.example.".to_string())]);
    let lookup = Arc::new(ScriptedLookup::new(LocalLookupStatus::Cname, Some(rdataset)));
    let fetch = Arc::new(GatedFetch::ungated(FetchOutcome::Failure));
    let adb = Adb::new(AdbConfig::default(), lookup, fetch);

    let response = adb
        .create_find("www.example.", "example.", FindOptions::INET, 1000, None)
        .await
        .unwrap();

    match response.outcome {
        LookupOutcome::Alias(target) => assert_eq!(target, "host.example."),
        other => panic!("expected Alias, got {other:?}"),
    }
    assert!(response.addresses.is_empty());
}

/// S5 — an endpoint marked lame for a zone is filtered out of that zone's
/// find but still present for an unrelated zone.
#[tokio::test]
async fn lameness_filters_by_zone_only() {
    let lookup = Arc::new(ScriptedLookup::new(LocalLookupStatus::NotFound, None));
    let fetch = Arc::new(GatedFetch::ungated(FetchOutcome::Failure));
    let adb = Adb::new(AdbConfig::default(), lookup, fetch);

    let lame = addr("1.2.3.4");
    let ok = addr("1.2.3.5");
    adb.insert("n.", lame, 300, 1000).unwrap();
    adb.insert("n.", ok, 300, 1000).unwrap();

    let handle = adb.find_addr_info(lame, 1000);
    adb.mark_lame(&handle, "z.", 1000 + 3600);
    adb.free_addr_info(handle, 1000);

    let for_z = adb
        .create_find("n.", "z.", FindOptions::INET, 1000, None)
        .await
        .unwrap();
    assert_eq!(for_z.addresses.len(), 1);
    assert_eq!(for_z.addresses[0].snapshot.address, ok);

    let for_other = adb
        .create_find("n.", "other.", FindOptions::INET, 1000, None)
        .await
        .unwrap();
    assert_eq!(for_other.addresses.len(), 2);
}

/// S6 — shutdown delivers `Shutdown` to every outstanding Find, aborts the
/// in-flight fetch, drains every bucket, and leaves `dump` reporting no
/// live names or endpoints.
#[tokio::test]
async fn shutdown_drains_finds_names_and_endpoints() {
    let lookup = Arc::new(ScriptedLookup::new(LocalLookupStatus::NotFound, None));
    let fetch = Arc::new(GatedFetch::ungated(FetchOutcome::Success(RdataSet::new(
        30,
        vec![Rdata::A("9.9.9.9".parse().unwrap())],
    ))));
    let adb = Adb::new(AdbConfig::default(), lookup, fetch);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let response = adb
        .create_find(
            "stuck.example.",
            "example.",
            FindOptions::INET | FindOptions::WANT_EVENT,
            1000,
            Some(tx),
        )
        .await
        .unwrap();
    assert!(response.event_armed);

    // Nothing has yielded back to the runtime since the fetch was spawned,
    // so `shutdown` aborts it before it ever gets to run — the name it was
    // keeping alive is torn down in the same pass rather than through a
    // fetch-completion callback that will now never fire.
    adb.shutdown();

    let event = rx.recv().await.expect("shutdown delivers an event to every armed find");
    assert!(matches!(event, CompletionEvent::Shutdown));

    let dump = adb.dump();
    assert!(!dump.contains("name bucket"), "no live names after shutdown: {dump}");
    assert!(!dump.contains("endpoint bucket"), "no live endpoints after shutdown: {dump}");

    // Idempotent.
    adb.shutdown();
}

/// Property 7: `adjustSrtt` boundary and monotonic-interpolation behavior.
#[tokio::test]
async fn adjust_srtt_matches_the_rounding_contract() {
    let lookup = Arc::new(ScriptedLookup::new(LocalLookupStatus::NotFound, None));
    let fetch = Arc::new(GatedFetch::ungated(FetchOutcome::Failure));
    let adb = Adb::new(AdbConfig::default(), lookup, fetch);

    let a = addr("1.2.3.4");
    let handle = adb.find_addr_info(a, 1000);
    let old = handle.snapshot.srtt;

    adb.adjust_srtt(&handle, old, 10);
    let unchanged = adb.find_addr_info(a, 1000);
    assert_eq!(unchanged.snapshot.srtt, old);

    adb.adjust_srtt(&handle, 500, 0);
    let replaced = adb.find_addr_info(a, 1000);
    assert_eq!(replaced.snapshot.srtt, 500);
}
