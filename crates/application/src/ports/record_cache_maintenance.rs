use async_trait::async_trait;
use ferrous_adb_domain::AdbError;

/// Outcome of one incremental sweep of the generic record cache.
#[derive(Debug, Default, Clone)]
pub struct SweepOutcome {
    pub buckets_visited: usize,
    pub entries_expired: usize,
    pub entries_remaining: usize,
}

/// Whether the cleaner has work outstanding. Mirrors the two states the
/// cleaner's ticker can be in: waiting for its next tick, or mid-sweep and
/// not yet caught up to the bucket it started at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanerState {
    Idle,
    Busy,
}

/// Maintenance port for the generic record cache (distinct from the address
/// database's own per-bucket cleaner). Driven by a ticker at
/// `AdbConfig::clean_interval_secs`; each call visits one bucket's worth of
/// entries rather than the whole cache, so a single sweep never holds any
/// one lock for long.
#[async_trait]
pub trait RecordCacheMaintenancePort: Send + Sync {
    /// Visit the next bucket, expiring anything past its TTL.
    async fn tick(&self, now: i64) -> Result<SweepOutcome, AdbError>;

    /// Current state, for tests and diagnostics.
    fn state(&self) -> CleanerState;
}
