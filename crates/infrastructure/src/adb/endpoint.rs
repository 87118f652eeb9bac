use ferrous_adb_domain::{AddrInfoSnapshot, EndpointFlags};
use std::net::SocketAddr;

/// A single resolved address and everything learned about reaching it
/// (BIND9's `dns_adbentry_t`). Shared across every name that resolves to
/// it, so goodness/srtt/lameness updates are visible cache-wide.
#[derive(Debug, Clone)]
pub struct EndpointEntry {
    pub address: SocketAddr,

    /// References held by `AddrInfoHandle`s plus one per name currently
    /// pointing at this endpoint. Reaching zero arms `expire_at`.
    pub refs: i64,

    pub goodness: i32,
    pub srtt: u32,
    pub flags: EndpointFlags,

    /// Zones this endpoint has been marked lame for, with the deadline
    /// after which the mark is forgiven.
    pub lame_zones: Vec<(String, i64)>,

    /// Set once `refs` drops to zero; the endpoint is collected once this
    /// passes. `None` while still referenced.
    pub expire_at: Option<i64>,
}

impl EndpointEntry {
    pub fn new(address: SocketAddr, _now: i64) -> Self {
        Self {
            address,
            refs: 0,
            goodness: 0,
            // BIND9 seeds srtt with a small random jitter so a fresh cohort
            // of equally-unknown endpoints doesn't all sort identically.
            srtt: fastrand::u32(1..=32),
            flags: EndpointFlags::empty(),
            lame_zones: Vec::new(),
            expire_at: None,
        }
    }

    /// Bad-for-zone(Z, now): true iff a live lame mark for `zone` covers
    /// `now`. Expired marks encountered along the way are purged in place,
    /// per the scan contract — every check doubles as a cleanup pass.
    pub fn is_lame_for(&mut self, zone: &str, now: i64) -> bool {
        self.lame_zones.retain(|(_, until)| *until > now);
        self.lame_zones.iter().any(|(z, _)| z == zone)
    }

    pub fn mark_lame(&mut self, zone: &str, until: i64) {
        if let Some(entry) = self.lame_zones.iter_mut().find(|(z, _)| z == zone) {
            entry.1 = until;
        } else {
            self.lame_zones.push((zone.to_string(), until));
        }
    }

    pub fn adjust_goodness(&mut self, delta: i32) {
        self.goodness = self.goodness.saturating_add(delta);
    }

    /// `new_srtt = old_srtt * factor / 10 + rtt * (10 - factor) / 10`,
    /// saturating rather than panicking on overflow at the boundaries
    /// (`factor == 0` and `factor == 10`).
    pub fn adjust_srtt(&mut self, rtt: u32, factor: u8) {
        let factor = factor.min(10) as u64;
        let old = (self.srtt as u64).saturating_mul(factor) / 10;
        let new = (rtt as u64).saturating_mul(10 - factor) / 10;
        self.srtt = old.saturating_add(new).min(u32::MAX as u64) as u32;
    }

    pub fn snapshot(&self) -> AddrInfoSnapshot {
        AddrInfoSnapshot {
            address: self.address,
            goodness: self.goodness,
            srtt: self.srtt,
            flags: self.flags,
        }
    }
}
