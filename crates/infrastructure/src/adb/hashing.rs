use std::hash::{Hash, Hasher};
use std::net::SocketAddr;

use rustc_hash::FxHasher;

/// Bucket selection for names. Case-insensitive: BIND9 downcases names
/// before hashing, and so do we.
pub fn name_bucket(name: &str, nbuckets: usize) -> usize {
    let mut hasher = FxHasher::default();
    for b in name.bytes() {
        b.to_ascii_lowercase().hash(&mut hasher);
    }
    (hasher.finish() as usize) % nbuckets
}

/// Bucket selection for endpoints, keyed by address.
pub fn endpoint_bucket(addr: SocketAddr, nbuckets: usize) -> usize {
    let mut hasher = FxHasher::default();
    addr.hash(&mut hasher);
    (hasher.finish() as usize) % nbuckets
}
