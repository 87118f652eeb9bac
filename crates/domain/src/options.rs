use bitflags::bitflags;

bitflags! {
    /// Options bitmap accepted by `createFind`.
    ///
    /// `INET` / `INET6` double as the "family" mask elsewhere (partial
    /// result tracking, query-pending tracking) — anywhere a `FindOptions`
    /// value is documented as a "family mask" only those two bits are
    /// meaningful.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FindOptions: u16 {
        /// Want IPv4 endpoints.
        const INET           = 0b0000_0001;
        /// Want IPv6 endpoints.
        const INET6          = 0b0000_0010;
        /// Deliver a completion event when more info arrives.
        const WANT_EVENT      = 0b0000_0100;
        /// Wait for an event even if some endpoints are already present.
        const EMPTY_EVENT     = 0b0000_1000;
        /// Do not start a fetch if any acceptable family is already populated.
        const AVOID_FETCHES   = 0b0001_0000;
        /// Direct a started fetch to begin iteration at the root.
        const START_AT_ROOT   = 0b0010_0000;
        /// Allow the local-lookup capability to return hint data.
        const HINT_OK         = 0b0100_0000;
    }
}

impl FindOptions {
    /// The subset of bits that denote address families (`INET`/`INET6`).
    pub const ADDRESS_MASK: FindOptions = FindOptions::INET.union(FindOptions::INET6);

    pub fn wants_inet(self) -> bool {
        self.contains(FindOptions::INET)
    }

    pub fn wants_inet6(self) -> bool {
        self.contains(FindOptions::INET6)
    }

    pub fn families(self) -> FindOptions {
        self & FindOptions::ADDRESS_MASK
    }
}
