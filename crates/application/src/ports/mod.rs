mod address_database;
mod fetch;
mod local_lookup;
mod record_cache_maintenance;

pub use address_database::{AddrInfoHandle, AddressDatabasePort, CreateFindResponse};
pub use fetch::{FetchOutcome, FetchPort, FetchRequest};
pub use local_lookup::LocalLookupPort;
pub use record_cache_maintenance::{CleanerState, RecordCacheMaintenancePort, SweepOutcome};
