//! Infrastructure layer: the concrete address database engine and its
//! generic record cache, implementing the ports the application layer
//! declares.

pub mod adb;

pub use adb::{Adb, AdbCleaner};
pub use adb::record_cache::{RecordCache, RecordCacheCleaner};
