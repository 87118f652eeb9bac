use serde::{Deserialize, Serialize};

fn default_nbuckets() -> usize {
    1009
}

fn default_clean_interval_secs() -> u64 {
    // Preserves `sweep_period = nbuckets * clean_interval ~= 300s`.
    (300 / default_nbuckets() as u64).max(1)
}

fn default_cache_floor_secs() -> u32 {
    10
}

fn default_auth_nxdomain_ttl_secs() -> u32 {
    30
}

fn default_fetch_failure_throttle_secs() -> u32 {
    300
}

fn default_freed_addrinfo_ttl_secs() -> i64 {
    1800
}

fn default_a6_chain_fanout_limit() -> u32 {
    16
}

fn default_pool_free_items() -> usize {
    16
}

fn default_pool_fill_count() -> usize {
    8
}

fn default_a6_enabled() -> bool {
    false
}

/// Tunables for the address database. Field defaults preserve the
/// constants of the implementation this crate is modeled on
/// (`NBUCKETS = 1009`, `ADB_CACHE_MINIMUM = 10`, etc.) while making every
/// one of them overridable.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AdbConfig {
    #[serde(default = "default_nbuckets")]
    pub nbuckets: usize,

    /// Seconds between cleaner ticks; each tick visits one bucket.
    #[serde(default = "default_clean_interval_secs")]
    pub clean_interval_secs: u64,

    /// Floor applied to every imported TTL and negative-cache TTL.
    #[serde(default = "default_cache_floor_secs")]
    pub cache_floor_secs: u32,

    /// TTL used for an authoritative negative answer that carries no TTL
    /// of its own.
    #[serde(default = "default_auth_nxdomain_ttl_secs")]
    pub auth_nxdomain_ttl_secs: u32,

    /// How far a generic fetch failure pushes the family expiry forward,
    /// to throttle retries.
    #[serde(default = "default_fetch_failure_throttle_secs")]
    pub fetch_failure_throttle_secs: u32,

    /// Expiry granted to an endpoint when its last `AddrInfo` reference is
    /// released via `freeAddrInfo`.
    #[serde(default = "default_freed_addrinfo_ttl_secs")]
    pub freed_addrinfo_ttl_secs: i64,

    /// Fan-out cap ("fuel") on the A6 chain walk.
    #[serde(default = "default_a6_chain_fanout_limit")]
    pub a6_chain_fanout_limit: u32,

    /// Whether A6 chain walking is enabled at all (A6 is deprecated in
    /// practice; gated behind a feature flag).
    #[serde(default = "default_a6_enabled")]
    pub a6_enabled: bool,

    /// Retained freed-entity high-water mark per pool.
    #[serde(default = "default_pool_free_items")]
    pub pool_free_items: usize,

    /// Batch allocation size per pool.
    #[serde(default = "default_pool_fill_count")]
    pub pool_fill_count: usize,
}

impl Default for AdbConfig {
    fn default() -> Self {
        Self {
            nbuckets: default_nbuckets(),
            clean_interval_secs: default_clean_interval_secs(),
            cache_floor_secs: default_cache_floor_secs(),
            auth_nxdomain_ttl_secs: default_auth_nxdomain_ttl_secs(),
            fetch_failure_throttle_secs: default_fetch_failure_throttle_secs(),
            freed_addrinfo_ttl_secs: default_freed_addrinfo_ttl_secs(),
            a6_chain_fanout_limit: default_a6_chain_fanout_limit(),
            a6_enabled: default_a6_enabled(),
            pool_free_items: default_pool_free_items(),
            pool_fill_count: default_pool_fill_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_period_invariant_holds_by_default() {
        let cfg = AdbConfig::default();
        assert_eq!(cfg.nbuckets * cfg.clean_interval_secs as usize, 1009);
    }

    #[test]
    fn deserializes_with_defaults_from_empty_json() {
        let cfg: AdbConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.cache_floor_secs, 10);
    }
}
