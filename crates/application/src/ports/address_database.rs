use async_trait::async_trait;
use ferrous_adb_domain::{
    AddrInfoSnapshot, AdbError, CompletionEvent, EndpointFlags, EndpointKey, FindKey, FindOptions,
    LookupOutcome,
};
use std::net::SocketAddr;
use tokio::sync::{mpsc, oneshot};

/// A caller-held reference to one endpoint's metrics, as handed out by
/// `findAddrInfo` or carried inside a `Find`'s results. Carries the handle
/// needed to release the endpoint's refcount via `freeAddrInfo`.
#[derive(Debug, Clone, Copy)]
pub struct AddrInfoHandle {
    pub entry: EndpointKey,
    pub snapshot: AddrInfoSnapshot,
}

/// Everything `createFind` handed back: the find's handle (for
/// `destroyFind`/`cancelFind`), the outcome, and whatever addresses were
/// already known.
#[derive(Debug, Clone)]
pub struct CreateFindResponse {
    pub find: FindKey,
    pub outcome: LookupOutcome,
    pub addresses: Vec<AddrInfoHandle>,
    /// True iff a completion event was armed and will eventually be sent
    /// on the channel passed to `createFind`.
    pub event_armed: bool,
}

/// The address database's external surface. Implemented by the
/// infrastructure engine; consumed by the surrounding resolver.
///
/// Methods are async because `create_find` may need to consult a
/// `LocalLookupPort` and spawn a fetch before it can answer; the rest are
/// in-memory bucket operations that happen to share the trait so callers
/// hold one handle to the whole surface.
#[async_trait]
pub trait AddressDatabasePort: Send + Sync {
    /// Increment the external refcount.
    fn attach(&self);
    /// Decrement the external refcount.
    fn detach(&self);

    /// Queue a one-shot notification for when the ADB is fully quiesced.
    /// If the ADB is already quiesced, the event fires immediately.
    fn when_shutdown(&self, event: oneshot::Sender<()>);

    /// Begin the shutdown sequence. Idempotent.
    fn shutdown(&self);

    /// `event_tx` is the caller's task mailbox; required when
    /// `FindOptions::WANT_EVENT` is set.
    async fn create_find(
        &self,
        name: &str,
        zone: &str,
        options: FindOptions,
        now: i64,
        event_tx: Option<mpsc::UnboundedSender<CompletionEvent>>,
    ) -> Result<CreateFindResponse, AdbError>;

    /// Precondition: the event has either never been armed, or has already
    /// been observed by the caller.
    fn destroy_find(&self, find: FindKey);

    /// Idempotent; always delivers a single `Canceled` event if one was
    /// promised and not yet sent.
    fn cancel_find(&self, find: FindKey);

    /// Kill a name and everything hanging off it.
    fn delete_name(&self, name: &str);

    /// Test-insertion of a single v4 entry; starts no fetch.
    fn insert(&self, name: &str, addr: SocketAddr, ttl: u32, now: i64) -> Result<(), AdbError>;

    /// Get-or-create an `AddrInfo` for a known address.
    fn find_addr_info(&self, addr: SocketAddr, now: i64) -> AddrInfoHandle;

    /// Release a reference obtained from `findAddrInfo` or a `Find`'s
    /// results. Sets the endpoint's expiry to `now + freed_addrinfo_ttl`
    /// if no other reference remains.
    fn free_addr_info(&self, info: AddrInfoHandle, now: i64);

    fn mark_lame(&self, info: &AddrInfoHandle, zone: &str, until: i64);
    fn adjust_goodness(&self, info: &AddrInfoHandle, delta: i32);
    /// `factor` in `[0, 10]`; `new = srtt * factor / 10 + rtt * (10 - factor) / 10`.
    fn adjust_srtt(&self, info: &AddrInfoHandle, rtt: u32, factor: u8);
    fn change_flags(&self, info: &AddrInfoHandle, bits: EndpointFlags, mask: EndpointFlags);

    /// Diagnostic snapshot, formatted the way callers can write straight to
    /// a file. Acquires every bucket lock in ascending order before
    /// iterating.
    fn dump(&self) -> String;
}
