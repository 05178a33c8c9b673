use crate::{Components, IdGenStatus, Layout, Result, SnowflakeId};

/// The interface shared by the lock-based and lock-free generators.
pub trait SnowflakeGenerator {
    /// The layout every issued ID is packed with.
    fn layout(&self) -> &Layout;

    /// The worker ID embedded in every issued ID.
    fn worker_id(&self) -> u64;

    /// The datacenter ID embedded in every issued ID.
    fn datacenter_id(&self) -> u64;

    /// Generates the next ID, busy-waiting for the next millisecond when the
    /// current one is exhausted.
    ///
    /// The wait has no timeout: a clock that stops advancing blocks the
    /// caller indefinitely. Use [`Self::try_poll_id`] where that matters.
    ///
    /// # Errors
    ///
    /// - [`Error::ClockRegression`] if the clock is behind the last issued
    ///   timestamp. Nothing is mutated, so the call may be retried.
    /// - [`Error::TimestampOutOfRange`] if the clock is outside the layout's
    ///   timestamp window.
    /// - `Error::LockPoisoned` if a lock-based generator's mutex is poisoned.
    ///
    /// [`Error::ClockRegression`]: crate::Error::ClockRegression
    /// [`Error::TimestampOutOfRange`]: crate::Error::TimestampOutOfRange
    fn try_next_id(&self) -> Result<SnowflakeId>;

    /// Attempts to generate the next ID without blocking.
    ///
    /// Returns [`IdGenStatus::Pending`] instead of waiting when the current
    /// millisecond is exhausted, leaving the generator state untouched.
    ///
    /// # Errors
    ///
    /// Same as [`Self::try_next_id`].
    fn try_poll_id(&self) -> Result<IdGenStatus>;

    /// Splits an ID issued by this generator into its fields.
    fn decompose(&self, id: SnowflakeId) -> Components {
        self.layout().decompose(id)
    }
}
