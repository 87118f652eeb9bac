//! Stable arena handles shared between the application ports and the
//! infrastructure engine.
//!
//! The source this crate is modeled on threads intrusive doubly-linked
//! lists through every entity (buckets, hook lists, fetch lists, find
//! lists). Per the redesign notes, each of those becomes an arena of stable
//! handles instead: a `slotmap::SlotMap` keyed by one of these types, so
//! unlink-by-handle and iteration are both O(1)/O(n) without raw pointers.

use slotmap::new_key_type;

new_key_type! {
    /// Handle to a `Name` entity.
    pub struct NameKey;
    /// Handle to an `Endpoint` entity.
    pub struct EndpointKey;
    /// Handle to a `NameHook` edge (Name -> Endpoint).
    pub struct NameHookKey;
    /// Handle to a caller-facing `Find`.
    pub struct FindKey;
    /// Handle to an outstanding fetch (A, AAAA, or one A6 step).
    pub struct FetchKey;
}
