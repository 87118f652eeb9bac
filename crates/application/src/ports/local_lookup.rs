use async_trait::async_trait;
use ferrous_adb_domain::{FindOptions, LocalLookupResult, RecordKind};

/// The "what do you already know about name N, type T?" capability,
/// consumed from the view/database layer. Answered from authoritative data,
/// hints, or a stale cache — never by a network query.
#[async_trait]
pub trait LocalLookupPort: Send + Sync {
    async fn lookup(
        &self,
        name: &str,
        kind: RecordKind,
        now: i64,
        options: FindOptions,
    ) -> LocalLookupResult;
}
