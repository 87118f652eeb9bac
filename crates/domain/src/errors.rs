use thiserror::Error;

/// Error kinds surfaced to callers of the address database.
///
/// Everything else (partial import failures, stale `ZoneInfo` entries,
/// cleaner iterator errors) is recovered internally and never reaches this
/// type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdbError {
    #[error("address database is shutting down")]
    ShuttingDown,

    #[error("out of memory")]
    NoMemory,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Exists(String),

    #[error("internal invariant violated: {0}")]
    Internal(String),
}
