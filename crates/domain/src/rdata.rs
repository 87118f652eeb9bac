use std::net::{Ipv4Addr, Ipv6Addr};

/// The record kind a lookup or fetch is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    A,
    Aaaa,
    A6,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Aaaa => "AAAA",
            Self::A6 => "A6",
        }
    }
}

/// Status returned by the local-lookup capability. The address database
/// consumes already-parsed record sets; it never touches wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalLookupStatus {
    Success,
    Glue,
    Hint,
    Cname,
    Dname,
    NcacheNxdomain,
    NcacheNxrrset,
    AuthNxdomain,
    AuthNxrrset,
    NotFound,
    Other,
}

impl LocalLookupStatus {
    pub fn is_usable_success(self) -> bool {
        matches!(self, Self::Success | Self::Glue | Self::Hint)
    }

    pub fn is_alias(self) -> bool {
        matches!(self, Self::Cname | Self::Dname)
    }

    pub fn is_negative(self) -> bool {
        matches!(
            self,
            Self::NcacheNxdomain | Self::NcacheNxrrset | Self::AuthNxdomain | Self::AuthNxrrset
        )
    }

    /// Whether this negative status came with an authoritative answer
    /// (no TTL available, so callers fall back to a fixed floor).
    pub fn is_authoritative_negative(self) -> bool {
        matches!(self, Self::AuthNxdomain | Self::AuthNxrrset)
    }
}

/// One already-parsed resource record as consumed by the importer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rdata {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Cname(String),
    Dname(String),
    /// An A6 record: a prefix length, the known high bits of the address
    /// (as a full 128-bit value with the unknown low bits zeroed), and the
    /// name to fetch next when `prefix_len > 0`.
    A6 {
        prefix_len: u8,
        known_bits: u128,
        next_name: Option<String>,
    },
}

/// A record set plus its TTL, as returned by the local-lookup capability or
/// a completed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdataSet {
    pub ttl: u32,
    pub records: Vec<Rdata>,
}

impl RdataSet {
    pub fn new(ttl: u32, records: Vec<Rdata>) -> Self {
        Self { ttl, records }
    }
}

/// Outcome of a local-lookup call.
#[derive(Debug, Clone)]
pub struct LocalLookupResult {
    pub status: LocalLookupStatus,
    pub rdataset: Option<RdataSet>,
}
