//! Ferrous ADB domain layer — pure value types shared across the address
//! database's ports and its infrastructure engine. No locking, no async
//! runtime, no I/O.

pub mod addr_info;
pub mod config;
pub mod endpoint_flags;
pub mod errors;
pub mod events;
pub mod handles;
pub mod lookup_outcome;
pub mod options;
pub mod rdata;

pub use addr_info::AddrInfoSnapshot;
pub use config::AdbConfig;
pub use endpoint_flags::{EdnsLevel, EndpointFlags};
pub use errors::AdbError;
pub use events::CompletionEvent;
pub use handles::{EndpointKey, FetchKey, FindKey, NameHookKey, NameKey};
pub use lookup_outcome::LookupOutcome;
pub use options::FindOptions;
pub use rdata::{LocalLookupResult, LocalLookupStatus, Rdata, RdataSet, RecordKind};
