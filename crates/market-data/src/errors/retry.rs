/// Classification for retry policy.
///
/// Used by the fetch client and the price resolver to decide what happens
/// after an endpoint reports an error.
///
/// | Class | Retry same endpoint? | Continue fallback chain? |
/// |-------|----------------------|--------------------------|
/// | `Never` | No | No |
/// | `WithBackoff` | Yes, until the attempt budget is spent | After the budget |
/// | `NextTier` | No | Yes |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Terminal. The request is invalid or the chain is already exhausted.
    Never,

    /// Transient upstream trouble (429, 403, 5xx, timeouts).
    /// Retried with jittered exponential backoff.
    WithBackoff,

    /// This endpoint or source can't answer, but the next one in the
    /// fallback chain might.
    NextTier,
}
