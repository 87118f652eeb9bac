use crate::options::FindOptions;

/// Completion event delivered to a caller's task mailbox, at most once per
/// `Find`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEvent {
    /// New addresses became available for the given families.
    MoreAddresses(FindOptions),
    /// No further addresses are coming for the given families (all
    /// outstanding fetches for them have concluded, successfully or not).
    NoMoreAddresses(FindOptions),
    /// The find was canceled via `cancelFind` before an event was sent.
    Canceled,
    /// The address database is shutting down.
    Shutdown,
}
