/// Return value of `createFind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Data present and/or an event is pending.
    Success,
    /// An alias target was recorded (and, if a target buffer was supplied,
    /// copied into it). No fetches were started.
    Alias(String),
}
