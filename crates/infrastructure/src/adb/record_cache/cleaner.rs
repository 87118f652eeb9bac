use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ferrous_adb_application::{CleanerState, RecordCacheMaintenancePort, SweepOutcome};
use ferrous_adb_domain::AdbError;
use tracing::{trace, warn};

use super::storage::RecordCache;

/// Drives `RecordCache`'s incremental sweep: one shard per `tick`, cycling
/// back to `Idle` once a full pass completes without having fallen behind.
pub struct RecordCacheCleaner<V> {
    cache: Arc<RecordCache<V>>,
    next_shard: AtomicUsize,
    /// Mid a multi-tick pass across all shards; surfaced via `state()`.
    busy: std::sync::atomic::AtomicBool,
    /// Guards a single `tick` call's own execution, so a ticker firing
    /// again before the previous tick has returned (§4.5: "If Busy when
    /// the ticker fires") is refused instead of racing a second pass.
    in_progress: std::sync::atomic::AtomicBool,
}

impl<V: Clone + Send + Sync + 'static> RecordCacheCleaner<V> {
    pub fn new(cache: Arc<RecordCache<V>>) -> Self {
        Self {
            cache,
            next_shard: AtomicUsize::new(0),
            busy: std::sync::atomic::AtomicBool::new(false),
            in_progress: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<V: Clone + Send + Sync + 'static> RecordCacheMaintenancePort for RecordCacheCleaner<V> {
    async fn tick(&self, now: i64) -> Result<SweepOutcome, AdbError> {
        if self.in_progress.swap(true, Ordering::AcqRel) {
            warn!("record cache cleaner ticked again while a previous pass is still in progress; skipping");
            return Ok(SweepOutcome::default());
        }

        self.busy.store(true, Ordering::Release);
        let idx = self
            .next_shard
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % self.cache.shard_count()))
            .map_err(|_| AdbError::Internal("shard counter update failed".into()));
        let idx = match idx {
            Ok(idx) => idx,
            Err(err) => {
                self.in_progress.store(false, Ordering::Release);
                return Err(err);
            }
        };
        let (expired, remaining) = self.cache.sweep_shard(idx, now);
        let just_wrapped = idx == self.cache.shard_count() - 1;
        self.busy.store(!just_wrapped, Ordering::Release);
        if expired > 0 {
            trace!(shard = idx, expired, "record cache sweep");
        }
        self.in_progress.store(false, Ordering::Release);
        Ok(SweepOutcome { buckets_visited: 1, entries_expired: expired, entries_remaining: remaining })
    }

    fn state(&self) -> CleanerState {
        if self.busy.load(Ordering::Acquire) {
            CleanerState::Busy
        } else {
            CleanerState::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_between_full_cycles() {
        let cache = Arc::new(RecordCache::<u32>::new(4));
        let cleaner = RecordCacheCleaner::new(cache);
        assert_eq!(cleaner.state(), CleanerState::Idle);
        for i in 0..4 {
            cleaner.tick(0).await.unwrap();
            if i < 3 {
                assert_eq!(cleaner.state(), CleanerState::Busy);
            }
        }
        assert_eq!(cleaner.state(), CleanerState::Idle);
    }
}
