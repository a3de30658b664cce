/// Classification for retry policy.
///
/// Used by the client's fetch loop to decide whether a failed gateway call is
/// attempted again.
///
/// # Behavior Summary
///
/// | Class | Retried locally? | Consumes another rate slot? |
/// |-------|------------------|-----------------------------|
/// | `WithBackoff` | Yes, bounded by `max_retries` | Yes |
/// | `Never` | No | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - bad query, provider rejection, malformed payload or an
    /// exhausted budget. Surfaced to the caller as-is.
    Never,

    /// Retry with exponential backoff.
    ///
    /// Used for transport failures (connection refused, reset, read timeout)
    /// where the same request has a fair chance of succeeding moments later.
    WithBackoff,
}
