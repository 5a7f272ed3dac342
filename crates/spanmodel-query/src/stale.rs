//! The stale-read capability shared by read request builders.

use crate::bound::TimestampBound;

/// Implemented by any builder that can carry a read-consistency bound.
///
/// At most one bound is attached at a time. Attaching again replaces the
/// previous bound (last write wins): a query may be reconfigured any number
/// of times before it runs. A builder with no bound reads strongly.
///
/// # Example
///
/// ```ignore
/// let request = ReadBuilder::new("Singers")
///     .columns(&["SingerId", "Name"])
///     .with_staleness(TimestampBound::max_staleness(TimeDelta::seconds(10))?)
///     .build()?;
/// ```
pub trait SupportsStaleReads {
    /// Attach `bound`, replacing any bound already attached.
    fn set_staleness(&mut self, bound: TimestampBound);

    /// Detach the bound, falling back to a strong read.
    fn clear_staleness(&mut self);

    /// The bound explicitly attached, if any.
    fn staleness(&self) -> Option<&TimestampBound>;

    /// Builder-style [`set_staleness`](Self::set_staleness).
    fn with_staleness(mut self, bound: TimestampBound) -> Self
    where
        Self: Sized,
    {
        self.set_staleness(bound);
        self
    }

    /// The bound the request will be dispatched with.
    fn effective_bound(&self) -> TimestampBound {
        self.staleness().copied().unwrap_or_else(TimestampBound::strong)
    }
}
