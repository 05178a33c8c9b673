use crate::SnowflakeId;

/// Represents the result of polling a generator for a new ID.
///
/// This type models the outcome of [`SnowflakeGenerator::try_poll_id`]:
///
/// - [`IdGenStatus::Ready`] indicates a new ID was successfully generated.
/// - [`IdGenStatus::Pending`] means the current millisecond is exhausted and
///   no ID can be produced until the clock reaches `yield_until`.
///
/// Polling never blocks, which lets callers back off with a sleep, an async
/// timer or a cancellation check instead of the built-in busy-wait.
///
/// # Example
///
/// ```
/// use snowgen::{IdGenStatus, LockSnowflakeGenerator, SnowflakeGenerator};
///
/// let generator = LockSnowflakeGenerator::new(1, 1).unwrap();
/// let id = loop {
///     match generator.try_poll_id().unwrap() {
///         IdGenStatus::Ready { id } => break id,
///         IdGenStatus::Pending { .. } => std::thread::yield_now(),
///     }
/// };
/// assert!(id.to_i64() > 0);
/// ```
///
/// [`SnowflakeGenerator::try_poll_id`]: crate::SnowflakeGenerator::try_poll_id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdGenStatus {
    /// A unique ID was generated and is ready to use.
    Ready {
        /// The generated Snowflake ID.
        id: SnowflakeId,
    },
    /// The sequence is exhausted for the current millisecond.
    Pending {
        /// The Unix timestamp in milliseconds (inclusive) at which generation
        /// can resume.
        yield_until: u64,
    },
}
