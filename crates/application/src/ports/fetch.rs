use async_trait::async_trait;
use ferrous_adb_domain::{RdataSet, RecordKind};

/// A single outstanding resolver call, as seen from the ADB side.
/// `start_at_root` mirrors `DNS_ADBFIND_START_AT_ROOT`.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub name: String,
    pub kind: RecordKind,
    pub start_at_root: bool,
}

/// Outcome of a completed fetch, delivered once per fetch.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// A record set came back. May contain CNAME/DNAME records, in which
    /// case the importer records an alias target instead of addresses.
    Success(RdataSet),
    /// Negative answer (NXDOMAIN/NXRRSET), with a TTL if the SOA minimum
    /// was available.
    Negative { ttl: Option<u32> },
    /// Any other failure (timeout, SERVFAIL, transport error, ...): mapped
    /// to the generic-failure throttle.
    Failure,
}

/// The recursive resolver's "start a query, tell me when it's done"
/// capability. The ADB starts a fetch and is told the outcome
/// asynchronously; it never blocks a caller's thread on it.
///
/// Implementations are expected to be cancel-safe: the infrastructure layer
/// drives each call inside a task it can abort (`cancelFetch`) without the
/// future needing to know it was aborted.
#[async_trait]
pub trait FetchPort: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> FetchOutcome;
}
