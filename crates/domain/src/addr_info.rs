use crate::endpoint_flags::EndpointFlags;
use std::net::SocketAddr;

/// One row of a `Find`'s answer set: a snapshot of an endpoint's metrics at
/// the moment it was copied into the find.
///
/// The snapshot is a plain value — the endpoint it was copied from keeps
/// living (and mutating) independently; re-fetch through
/// `findAddrInfo`/`freeAddrInfo` to see current values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AddrInfoSnapshot {
    pub address: SocketAddr,
    pub goodness: i32,
    pub srtt: u32,
    pub flags: EndpointFlags,
}
