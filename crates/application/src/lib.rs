//! Application layer: the ports the address database's infrastructure
//! engine implements and the surrounding resolver consumes. No concrete
//! state lives here — only traits and the DTOs that cross them.

pub mod ports;

pub use ports::{
    AddrInfoHandle, AddressDatabasePort, CleanerState, CreateFindResponse, FetchOutcome,
    FetchPort, FetchRequest, LocalLookupPort, RecordCacheMaintenancePort, SweepOutcome,
};
