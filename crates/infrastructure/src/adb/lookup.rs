use std::sync::atomic::Ordering;
use std::sync::Arc;

use ferrous_adb_application::{
    AddrInfoHandle, CreateFindResponse, FetchOutcome, FetchRequest,
};
use ferrous_adb_domain::{
    AdbError, CompletionEvent, FindOptions, LocalLookupStatus, LookupOutcome, Rdata, RecordKind,
};
use tokio::sync::mpsc;
use tracing::trace;

use crate::adb::engine::Adb;
use crate::adb::name::NameEntry;

/// True for IPv4-mapped (`::ffff:a.b.c.d`) and IPv4-compatible (`::a.b.c.d`,
/// first 96 bits zero) addresses. Neither should ever be installed as a v6
/// endpoint; BIND9 skips both forms on import for the same reason.
fn is_ipv4_mapped_or_compatible(addr: &std::net::Ipv6Addr) -> bool {
    if addr.to_ipv4_mapped().is_some() {
        return true;
    }
    let segments = addr.segments();
    segments[0..6] == [0, 0, 0, 0, 0, 0] && !addr.is_unspecified() && *addr != std::net::Ipv6Addr::LOCALHOST
}

/// Answer from whatever is already cached, starting fetches for anything
/// missing and arming a completion event if the caller asked for one and
/// something is still outstanding.
pub(crate) async fn create_find(
    adb: &Adb,
    name: &str,
    zone: &str,
    options: FindOptions,
    now: i64,
    event_tx: Option<mpsc::UnboundedSender<CompletionEvent>>,
) -> Result<CreateFindResponse, AdbError> {
    if adb.shutting_down.load(Ordering::Acquire) {
        return Err(AdbError::ShuttingDown);
    }

    ensure_name_known(adb, name, zone, options, now).await;
    check_expire_name_hooks(adb, name, now);

    let bucket = adb.name_bucket_for(name);
    let (outcome, addresses, need_v4_fetch, need_v6_fetch) = {
        let mut entries = bucket.lock();
        let key = *entries
            .index
            .get(name)
            .expect("ensure_name_known always inserts the name");
        let entry = entries.pool.get(key).expect("just looked up by index");

        if let Some(alias) = entry.alias.clone() {
            if entry.expire_alias.map(|t| t > now).unwrap_or(false) {
                return Ok(CreateFindResponse {
                    find: register_find(adb, name, options, event_tx, false),
                    outcome: LookupOutcome::Alias(alias),
                    addresses: Vec::new(),
                    event_armed: false,
                });
            }
        }

        let want_v4 = options.wants_inet();
        let want_v6 = options.wants_inet6();

        let v4_fresh = entry.expire_v4.map(|t| t > now).unwrap_or(false);
        let v6_fresh = entry.expire_v6.map(|t| t > now).unwrap_or(false);

        let mut addrs = Vec::new();
        if want_v4 && v4_fresh {
            addrs.extend(entry.v4.iter().copied());
        }
        if want_v6 && v6_fresh {
            addrs.extend(entry.v6.iter().copied());
        }

        let auth_negative = entry.auth_nxdomain
            && entry.expire_v4.map(|t| t > now).unwrap_or(false)
            && entry.expire_v6.map(|t| t > now).unwrap_or(false);

        let throttled_v4 = entry.fetch_failure_until_v4.map(|t| t > now).unwrap_or(false);
        let throttled_v6 = entry.fetch_failure_until_v6.map(|t| t > now).unwrap_or(false);

        // When A6 is enabled, v6 fetches walk the A6 chain instead of
        // asking for AAAA directly; `fetch_a6` tracks that chain walk in
        // place of `fetch_v6`.
        let v6_inflight = if adb.config.a6_enabled { entry.fetch_a6.is_some() } else { entry.fetch_v6.is_some() };

        let need_v4 = want_v4
            && !v4_fresh
            && !auth_negative
            && !options.contains(FindOptions::AVOID_FETCHES)
            && !throttled_v4
            && entry.fetch_v4.is_none();
        let need_v6 = want_v6
            && !v6_fresh
            && !auth_negative
            && !options.contains(FindOptions::AVOID_FETCHES)
            && !throttled_v6
            && !v6_inflight;

        let outcome = LookupOutcome::Success;
        // Endpoints marked lame for this zone are filtered out here rather
        // than at fetch time, so a lame mark takes effect immediately for
        // every subsequent find.
        let handles: Vec<AddrInfoHandle> = addrs
            .into_iter()
            .filter_map(|eref| {
                let ebucket = &adb.endpoint_buckets[eref.bucket];
                let mut eentries = ebucket.lock();
                let e = eentries.pool.get_mut(eref.key).expect("endpoint handle is live");
                if e.is_lame_for(zone, now) {
                    return None;
                }
                e.refs += 1;
                Some(AddrInfoHandle { entry: eref.key, snapshot: e.snapshot() })
            })
            .collect();

        (outcome, handles, need_v4, need_v6)
    };

    if need_v4_fetch {
        spawn_fetch(adb, name, name, zone, RecordKind::A, now);
    }
    if need_v6_fetch {
        let v6_kind = if adb.config.a6_enabled { RecordKind::A6 } else { RecordKind::Aaaa };
        spawn_fetch(adb, name, name, zone, v6_kind, now);
    }

    let still_missing = addresses.is_empty()
        && (need_v4_fetch || need_v6_fetch || fetch_in_flight(adb, name));
    let want_event = options.contains(FindOptions::WANT_EVENT);
    let event_armed = want_event && still_missing;

    // `EMPTY_EVENT`: caller wants an event even when nothing is missing.
    // There is nothing left to wait on, so the event fires immediately
    // instead of being armed against a future fetch completion.
    let mut event_tx = event_tx;
    if want_event && !still_missing && options.contains(FindOptions::EMPTY_EVENT) {
        if let Some(tx) = event_tx.take() {
            let _ = tx.send(CompletionEvent::NoMoreAddresses(options.families()));
        }
    }

    let find = register_find(adb, name, options, event_tx, event_armed);

    Ok(CreateFindResponse { find, outcome, addresses, event_armed })
}

fn fetch_in_flight(adb: &Adb, name: &str) -> bool {
    let bucket = adb.name_bucket_for(name);
    let entries = bucket.lock();
    entries
        .index
        .get(name)
        .and_then(|k| entries.pool.get(*k))
        .map(|e| e.fetch_v4.is_some() || e.fetch_v6.is_some() || e.fetch_a6.is_some())
        .unwrap_or(false)
}

fn register_find(
    adb: &Adb,
    name: &str,
    options: FindOptions,
    event_tx: Option<mpsc::UnboundedSender<CompletionEvent>>,
    armed: bool,
) -> ferrous_adb_domain::FindKey {
    let mut finds = adb.finds.lock();
    let key = finds.insert(crate::adb::find::FindEntry {
        name: name.to_string(),
        options,
        event_tx,
        event_sent: !armed,
        canceled: false,
    });
    if armed {
        let bucket = adb.name_bucket_for(name);
        let mut entries = bucket.lock();
        if let Some(e) = entries.index.get(name).and_then(|k| entries.pool.get_mut(*k)) {
            e.waiting_finds.push(key);
        }
    }
    key
}

/// Drops any v4/v6 `NameHook`s whose family has gone past its cached
/// expiry, releasing the endpoint reference each hook held and resetting
/// the family's expiry so the fetch-arming logic below treats it as empty
/// again (§4.2 step 4). A hook list that is merely stale but not yet
/// re-queried is never served to a caller (the `*_fresh` checks in
/// `create_find` already guard that); this is what reclaims it instead of
/// letting it accumulate forever.
fn check_expire_name_hooks(adb: &Adb, name: &str, now: i64) {
    let bucket = adb.name_bucket_for(name);
    let (expired_v4, expired_v6) = {
        let mut entries = bucket.lock();
        let Some(&key) = entries.index.get(name) else {
            return;
        };
        let Some(entry) = entries.pool.get_mut(key) else {
            return;
        };
        let v4 = if entry.expire_v4.map(|t| t <= now).unwrap_or(false) {
            entry.expire_v4 = None;
            std::mem::take(&mut entry.v4)
        } else {
            Vec::new()
        };
        let v6 = if entry.expire_v6.map(|t| t <= now).unwrap_or(false) {
            entry.expire_v6 = None;
            std::mem::take(&mut entry.v6)
        } else {
            Vec::new()
        };
        (v4, v6)
    };
    if !expired_v4.is_empty() || !expired_v6.is_empty() {
        trace!(name, v4 = expired_v4.len(), v6 = expired_v6.len(), "expired name hooks");
    }
    adb.release_hook_refs(&expired_v4);
    adb.release_hook_refs(&expired_v6);
}

/// Make sure a `NameEntry` exists for `name`, consulting the local lookup
/// port the first time it is seen or once its cached answer has expired.
///
/// "Cached answer" covers a fresh positive hit, a fresh negative-cache or
/// auth-NX entry (both recorded via `expire_v4`/`expire_v6` even with no
/// addresses attached), and a fresh alias target — any one of those is
/// reason enough to skip asking again, which is what lets a short negative
/// TTL actually suppress a second lookup instead of being silently
/// overwritten by it.
async fn ensure_name_known(adb: &Adb, name: &str, zone: &str, options: FindOptions, now: i64) {
    let needs_lookup = {
        let bucket = adb.name_bucket_for(name);
        let mut entries = bucket.lock();
        let key = *entries
            .index
            .entry(name.to_string())
            .or_insert_with(|| entries.pool.insert(NameEntry::new(name.to_string(), zone.to_string(), now)));
        let entry = entries.pool.get_mut(key).expect("just inserted");
        entry.last_used = now;

        let v4_satisfied = !options.wants_inet() || entry.expire_v4.map(|t| t > now).unwrap_or(false);
        let v6_satisfied = !options.wants_inet6() || entry.expire_v6.map(|t| t > now).unwrap_or(false);
        let alias_satisfied = entry.alias.is_some() && entry.expire_alias.map(|t| t > now).unwrap_or(false);

        !(alias_satisfied || (v4_satisfied && v6_satisfied))
    };

    if !needs_lookup {
        return;
    }

    let kind = if options.wants_inet6() && !options.wants_inet() {
        RecordKind::Aaaa
    } else {
        RecordKind::A
    };
    let result = adb.local_lookup.lookup(name, kind, now, options).await;
    apply_local_lookup(adb, name, now, result.status, result.rdataset);
}

fn apply_local_lookup(
    adb: &Adb,
    name: &str,
    now: i64,
    status: LocalLookupStatus,
    rdataset: Option<ferrous_adb_domain::RdataSet>,
) {
    let bucket = adb.name_bucket_for(name);
    let mut entries = bucket.lock();
    let key = *entries.index.get(name).expect("ensured above");
    let entry = entries.pool.get_mut(key).expect("just looked up");

    match status {
        LocalLookupStatus::NotFound | LocalLookupStatus::Other => {}
        LocalLookupStatus::NcacheNxdomain | LocalLookupStatus::NcacheNxrrset => {
            let ttl = rdataset.as_ref().map(|r| r.ttl).unwrap_or(adb.config.cache_floor_secs);
            entry.expire_v4 = Some(now + ttl.max(adb.config.cache_floor_secs) as i64);
            entry.expire_v6 = entry.expire_v4;
        }
        LocalLookupStatus::AuthNxdomain | LocalLookupStatus::AuthNxrrset => {
            entry.auth_nxdomain = true;
            let ttl = adb.config.auth_nxdomain_ttl_secs;
            entry.expire_v4 = Some(now + ttl as i64);
            entry.expire_v6 = entry.expire_v4;
        }
        LocalLookupStatus::Cname | LocalLookupStatus::Dname => {
            if let Some(set) = rdataset {
                if let Some(target) = set.records.iter().find_map(|r| match r {
                    Rdata::Cname(t) | Rdata::Dname(t) => Some(t.clone()),
                    _ => None,
                }) {
                    entry.alias = Some(target);
                    entry.expire_alias = Some(now + set.ttl.max(adb.config.cache_floor_secs) as i64);
                }
            }
        }
        LocalLookupStatus::Success | LocalLookupStatus::Glue | LocalLookupStatus::Hint => {
            if let Some(set) = rdataset {
                let ttl = set.ttl.max(adb.config.cache_floor_secs) as i64;
                for rdata in set.records {
                    match rdata {
                        Rdata::A(addr) => {
                            let sockaddr = std::net::SocketAddr::new(addr.into(), 0);
                            drop(entries);
                            let eref = adb.get_or_insert_endpoint(sockaddr, now);
                            adb.acquire_hook_refs(&[eref]);
                            entries = bucket.lock();
                            let entry = entries.pool.get_mut(key).expect("still live");
                            entry.v4.push(eref);
                            entry.expire_v4 = Some(now + ttl);
                        }
                        Rdata::Aaaa(addr) if is_ipv4_mapped_or_compatible(&addr) => {}
                        Rdata::Aaaa(addr) => {
                            let sockaddr = std::net::SocketAddr::new(addr.into(), 0);
                            drop(entries);
                            let eref = adb.get_or_insert_endpoint(sockaddr, now);
                            adb.acquire_hook_refs(&[eref]);
                            entries = bucket.lock();
                            let entry = entries.pool.get_mut(key).expect("still live");
                            entry.v6.push(eref);
                            entry.expire_v6 = Some(now + ttl);
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

/// Starts a fetch over the wire for `query_name` on behalf of `owner_name`.
/// They differ only mid A6 chain walk, where each hop queries a different
/// name but every result still lands on the name the caller originally
/// asked about.
fn spawn_fetch(adb_ref: &Adb, owner_name: &str, query_name: &str, zone: &str, kind: RecordKind, now: i64) {
    let Some(adb) = adb_ref.weak_self.upgrade() else {
        // Engine is already being torn down; nothing to spawn into.
        return;
    };

    let owner_owned = owner_name.to_string();
    let query_owned = query_name.to_string();
    let zone_owned = zone.to_string();
    let request = FetchRequest { name: query_owned.clone(), kind, start_at_root: false };

    let adb_for_task = Arc::clone(&adb);
    let task_owner = owner_owned.clone();
    let task_zone = zone_owned.clone();
    let join = tokio::spawn(async move {
        let outcome = adb_for_task.fetcher.fetch(request).await;
        import_fetch_result(&adb_for_task, &task_owner, &task_zone, kind, outcome, now).await;
    });
    let fetch_key = {
        let mut active = adb.active_fetches.lock();
        active.insert(join.abort_handle())
    };

    let bucket = adb.name_bucket_for(&owner_owned);
    let mut entries = bucket.lock();
    if let Some(e) = entries.index.get(&owner_owned).and_then(|k| entries.pool.get_mut(*k)) {
        match kind {
            RecordKind::A => e.fetch_v4 = Some(fetch_key),
            RecordKind::Aaaa => e.fetch_v6 = Some(fetch_key),
            RecordKind::A6 => e.fetch_a6 = Some(fetch_key),
        }
    }
    drop(entries);
    trace!(owner = %owner_owned, query = %query_owned, kind = %kind.as_str(), "fetch started");
}

async fn import_fetch_result(
    adb: &Arc<Adb>,
    owner_name: &str,
    zone: &str,
    kind: RecordKind,
    outcome: FetchOutcome,
    now: i64,
) {
    let bucket = adb.name_bucket_for(owner_name);
    let mut events_to_send: Vec<(ferrous_adb_domain::FindKey, CompletionEvent)> = Vec::new();
    let mut next_hop: Option<String> = None;

    {
        let mut entries = bucket.lock();
        let Some(&key) = entries.index.get(owner_name) else { return };

        match outcome {
            FetchOutcome::Success(set) => {
                let ttl = set.ttl.max(adb.config.cache_floor_secs) as i64;
                let mut alias_target = None;
                let mut new_v4 = Vec::new();
                let mut new_v6 = Vec::new();
                let mut a6_hop = None;
                let mut a6_complete = None;
                for rdata in &set.records {
                    match rdata {
                        Rdata::A(addr) => new_v4.push(std::net::SocketAddr::new((*addr).into(), 0)),
                        Rdata::Aaaa(addr) if is_ipv4_mapped_or_compatible(addr) => {}
                        Rdata::Aaaa(addr) => new_v6.push(std::net::SocketAddr::new((*addr).into(), 0)),
                        Rdata::Cname(t) | Rdata::Dname(t) => alias_target = Some(t.clone()),
                        Rdata::A6 { prefix_len, known_bits, next_name: Some(next) } if *prefix_len > 0 => {
                            a6_hop = Some((*prefix_len, *known_bits, next.clone()));
                        }
                        Rdata::A6 { known_bits, .. } => {
                            a6_complete = Some(*known_bits);
                        }
                    }
                }
                drop(entries);
                let v4_keys: Vec<_> = new_v4.iter().map(|a| adb.get_or_insert_endpoint(*a, now)).collect();
                let v6_keys: Vec<_> = new_v6.iter().map(|a| adb.get_or_insert_endpoint(*a, now)).collect();
                let a6_key = a6_complete.and_then(|bits| {
                    let v6 = std::net::Ipv6Addr::from(bits.to_be_bytes());
                    if is_ipv4_mapped_or_compatible(&v6) {
                        return None;
                    }
                    let addr = std::net::SocketAddr::new(v6.into(), 0);
                    Some(adb.get_or_insert_endpoint(addr, now))
                });
                entries = bucket.lock();
                if let Some(entry) = entries.pool.get_mut(key) {
                    if let Some(target) = alias_target {
                        entry.alias = Some(target);
                        entry.expire_alias = Some(now + ttl);
                    } else if kind == RecordKind::A6 {
                        if let Some((prefix_len, known_bits, next)) = a6_hop {
                            let depth = entry.chain.as_ref().map(|c| c.chains_followed).unwrap_or(0);
                            if depth < adb.config.a6_chain_fanout_limit {
                                entry.chain = Some(crate::adb::name::ChainState {
                                    next_name: next.clone(),
                                    known_bits,
                                    prefix_len,
                                    chains_followed: depth + 1,
                                });
                                next_hop = Some(next);
                            } else {
                                entry.chain = None;
                            }
                        } else if let Some(ekey) = a6_key {
                            adb.acquire_hook_refs(&[ekey]);
                            entry.v6.push(ekey);
                            entry.expire_v6 = Some(now + ttl);
                            entry.chain = None;
                        }
                    } else {
                        match kind {
                            RecordKind::A => {
                                adb.acquire_hook_refs(&v4_keys);
                                entry.v4.extend(v4_keys);
                                entry.expire_v4 = Some(now + ttl);
                            }
                            RecordKind::Aaaa => {
                                adb.acquire_hook_refs(&v6_keys);
                                entry.v6.extend(v6_keys);
                                entry.expire_v6 = Some(now + ttl);
                            }
                            RecordKind::A6 => unreachable!(),
                        }
                    }
                }
            }
            FetchOutcome::Negative { ttl } => {
                let ttl = ttl.unwrap_or(adb.config.auth_nxdomain_ttl_secs).max(adb.config.cache_floor_secs) as i64;
                if let Some(entry) = entries.pool.get_mut(key) {
                    match kind {
                        RecordKind::A => entry.expire_v4 = Some(now + ttl),
                        RecordKind::Aaaa | RecordKind::A6 => entry.expire_v6 = Some(now + ttl),
                    }
                }
            }
            FetchOutcome::Failure => {
                if let Some(entry) = entries.pool.get_mut(key) {
                    let until = Some(now + adb.config.fetch_failure_throttle_secs as i64);
                    match kind {
                        RecordKind::A => entry.fetch_failure_until_v4 = until,
                        RecordKind::Aaaa | RecordKind::A6 => entry.fetch_failure_until_v6 = until,
                    }
                }
            }
        }

        // A chain hop that wants to continue keeps `fetch_a6` armed rather
        // than clearing it, so `create_find` still sees the walk as in
        // flight; the next hop is spawned once the lock is released below.
        if next_hop.is_none() {
            if let Some(entry) = entries.pool.get_mut(key) {
                match kind {
                    RecordKind::A => entry.fetch_v4 = None,
                    RecordKind::Aaaa | RecordKind::A6 => {
                        entry.fetch_v6 = None;
                        entry.fetch_a6 = None;
                    }
                }
                if entry.fetch_v4.is_none() && entry.fetch_v6.is_none() && entry.fetch_a6.is_none() {
                    let family = match kind {
                        RecordKind::A => FindOptions::INET,
                        RecordKind::Aaaa | RecordKind::A6 => FindOptions::INET6,
                    };
                    let has_any = entry.has_addresses() || entry.alias.is_some();
                    let event = if has_any {
                        CompletionEvent::MoreAddresses(family)
                    } else {
                        CompletionEvent::NoMoreAddresses(family)
                    };
                    for find_key in entry.waiting_finds.drain(..) {
                        events_to_send.push((find_key, event.clone()));
                    }
                }
            }
        }
    }

    if let Some(next) = next_hop {
        spawn_fetch(adb, owner_name, &next, zone, RecordKind::A6, now);
    }

    if !events_to_send.is_empty() {
        let mut finds = adb.finds.lock();
        for (find_key, event) in events_to_send {
            if let Some(find) = finds.get_mut(find_key) {
                find.deliver(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::is_ipv4_mapped_or_compatible;
    use std::net::Ipv6Addr;

    #[test]
    fn flags_ipv4_mapped() {
        let addr: Ipv6Addr = "::ffff:1.2.3.4".parse().unwrap();
        assert!(is_ipv4_mapped_or_compatible(&addr));
    }

    #[test]
    fn flags_ipv4_compatible() {
        let addr: Ipv6Addr = "::1.2.3.4".parse().unwrap();
        assert!(is_ipv4_mapped_or_compatible(&addr));
    }

    #[test]
    fn leaves_unspecified_and_loopback_alone() {
        assert!(!is_ipv4_mapped_or_compatible(&Ipv6Addr::UNSPECIFIED));
        assert!(!is_ipv4_mapped_or_compatible(&Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn leaves_ordinary_v6_alone() {
        let addr: Ipv6Addr = "2001:db8::1".parse().unwrap();
        assert!(!is_ipv4_mapped_or_compatible(&addr));
    }
}
