use bitflags::bitflags;

bitflags! {
    /// Per-endpoint state bits, manipulated only through `changeFlags`
    /// (`(flags & !mask) | (bits & mask)`).
    ///
    /// The two low bits double as the EDNS level (`EDNS_BIT0`/`EDNS_BIT1`);
    /// `EndpointFlags::edns_level` decodes them into an `EdnsLevel`. This
    /// mirrors how the original implementation packs EDNS state into the
    /// same flags word as everything else rather than giving it its own
    /// field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EndpointFlags: u32 {
        const EDNS_BIT0   = 0b0000_0001;
        const EDNS_BIT1   = 0b0000_0010;
        /// Endpoint has been observed to support TCP fallback cleanly.
        const TCP_OK      = 0b0000_0100;
        /// Endpoint should be preferred when cookies are required.
        const COOKIE_OK   = 0b0000_1000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdnsLevel {
    #[default]
    None,
    Edns0,
    DoOk,
    /// Reserved for future use; preserved round-trip if ever observed.
    Reserved,
}

impl EndpointFlags {
    pub const EDNS_MASK: EndpointFlags = EndpointFlags::EDNS_BIT0.union(EndpointFlags::EDNS_BIT1);

    pub fn edns_level(self) -> EdnsLevel {
        match (self & Self::EDNS_MASK).bits() {
            0b00 => EdnsLevel::None,
            0b01 => EdnsLevel::Edns0,
            0b10 => EdnsLevel::DoOk,
            _ => EdnsLevel::Reserved,
        }
    }

    pub fn with_edns_level(mut self, level: EdnsLevel) -> Self {
        let bits = match level {
            EdnsLevel::None => 0b00,
            EdnsLevel::Edns0 => 0b01,
            EdnsLevel::DoOk => 0b10,
            EdnsLevel::Reserved => 0b11,
        };
        self.remove(Self::EDNS_MASK);
        self.insert(Self::from_bits_truncate(bits));
        self
    }

    /// `(flags & !mask) | (bits & mask)`, the `changeFlags` contract.
    pub fn apply(self, bits: EndpointFlags, mask: EndpointFlags) -> Self {
        (self & !mask) | (bits & mask)
    }
}
