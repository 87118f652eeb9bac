use ferrous_adb_domain::{EndpointKey, FetchKey, FindKey};

/// A `NameHook` edge: which endpoint bucket holds the target and the
/// handle within it. `EndpointKey`s are only unique within the `SlotMap`
/// that minted them, so a bare key can't be resolved back to its entry
/// without also knowing which of the `nbuckets` independent slotmaps to
/// look in — storing the bucket index here is the "which bucket holds me"
/// tag the redesign notes call for, tracked on the edge rather than the
/// endpoint since one endpoint can be hooked from many names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointRef {
    pub bucket: usize,
    pub key: EndpointKey,
}

/// State of an in-progress A6 chain walk (deprecated record type, gated
/// behind `AdbConfig::a6_enabled`). BIND9 walked A6 prefix chains with an
/// intrusive "sortlist" of partial records; we track the same walk as an
/// explicit state machine instead.
#[derive(Debug, Clone)]
pub struct ChainState {
    pub next_name: String,
    pub known_bits: u128,
    pub prefix_len: u8,
    pub chains_followed: u32,
}

/// One name's worth of cached knowledge (BIND9's `dns_adbname_t`, minus the
/// intrusive list pointers: callers reach a name only through its bucket's
/// index, and a name reaches its endpoints only through `EndpointKey`
/// handles). NameHook's only job in the original was gluing a name to an
/// endpoint with a couple of flags; folded directly into the `v4`/`v6`
/// fields here since the slotmap handle already gives us that link.
#[derive(Debug, Clone)]
pub struct NameEntry {
    pub name: String,
    pub zone: String,

    pub v4: Vec<EndpointRef>,
    pub v6: Vec<EndpointRef>,

    /// Set when the name resolved to a CNAME/DNAME target instead of
    /// addresses.
    pub alias: Option<String>,

    /// Expiry of the cached v4 answer (positive or negative).
    pub expire_v4: Option<i64>,
    /// Expiry of the cached v6 answer (positive or negative).
    pub expire_v6: Option<i64>,
    /// Expiry of the cached alias target.
    pub expire_alias: Option<i64>,

    pub auth_nxdomain: bool,

    /// Fetch-failure throttle deadlines, per family.
    pub fetch_failure_until_v4: Option<i64>,
    pub fetch_failure_until_v6: Option<i64>,

    pub fetch_v4: Option<FetchKey>,
    pub fetch_v6: Option<FetchKey>,
    pub fetch_a6: Option<FetchKey>,

    pub chain: Option<ChainState>,

    /// Finds currently waiting on this name (armed for a completion event
    /// once more information arrives).
    pub waiting_finds: Vec<FindKey>,

    pub last_used: i64,
}

impl NameEntry {
    pub fn new(name: String, zone: String, now: i64) -> Self {
        Self {
            name,
            zone,
            v4: Vec::new(),
            v6: Vec::new(),
            alias: None,
            expire_v4: None,
            expire_v6: None,
            expire_alias: None,
            auth_nxdomain: false,
            fetch_failure_until_v4: None,
            fetch_failure_until_v6: None,
            fetch_v4: None,
            fetch_v6: None,
            fetch_a6: None,
            chain: None,
            waiting_finds: Vec::new(),
            last_used: now,
        }
    }

    pub fn has_addresses(&self) -> bool {
        !self.v4.is_empty() || !self.v6.is_empty()
    }

    pub fn is_expired(&self, now: i64) -> bool {
        let v4_dead = self.expire_v4.map(|t| t <= now).unwrap_or(true);
        let v6_dead = self.expire_v6.map(|t| t <= now).unwrap_or(true);
        let alias_dead = self.expire_alias.map(|t| t <= now).unwrap_or(true);
        let fetching = self.fetch_v4.is_some() || self.fetch_v6.is_some() || self.fetch_a6.is_some();
        !fetching && self.waiting_finds.is_empty() && v4_dead && v6_dead && alias_dead
    }
}
