/// A result type defaulting to the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Rejected generator configuration.
///
/// Raised synchronously while constructing a [`Layout`] or a generator. These
/// errors are not retryable: the caller has to supply different values.
///
/// [`Layout`]: crate::Layout
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The worker ID is negative or exceeds what its bit field can hold.
    #[error("worker id can't be greater than {max} or less than 0 (got {value})")]
    WorkerIdOutOfRange { value: i64, max: u64 },

    /// The datacenter ID is negative or exceeds what its bit field can hold.
    #[error("datacenter id can't be greater than {max} or less than 0 (got {value})")]
    DatacenterIdOutOfRange { value: i64, max: u64 },

    /// A restored sequence exceeds what its bit field can hold.
    #[error("sequence can't be greater than {max} (got {value})")]
    SequenceOutOfRange { value: u64, max: u64 },

    /// The datacenter, worker and sequence widths do not add up to the 22 low
    /// bits below the timestamp.
    #[error("datacenter, worker and sequence bits must sum to 22 (got {total})")]
    InvalidLayout { total: u32 },
}

/// All errors a generator can produce.
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// See [`ConfigError`].
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The clock reports a time earlier than the last issued timestamp.
    ///
    /// The generator refuses instead of guessing and its state is left
    /// untouched, so the call can be retried once the clock catches up.
    #[error("clock moved backwards, refusing to generate id for {drift_ms} milliseconds")]
    ClockRegression {
        /// How far behind the last issued timestamp the clock is.
        drift_ms: u64,
    },

    /// The clock reads before the layout epoch, or so far past it that the
    /// elapsed time no longer fits the 41-bit timestamp field.
    #[error("timestamp {timestamp} ms is not representable against epoch {epoch} ms")]
    TimestampOutOfRange { timestamp: u64, epoch: u64 },

    /// The generator lock was poisoned by a thread that panicked while
    /// holding it.
    ///
    /// With the `parking-lot` feature mutexes do not poison, so this variant
    /// is not available.
    #[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
    #[cfg(not(feature = "parking-lot"))]
    #[error("generator lock poisoned")]
    LockPoisoned,
}

/// A raw value that cannot be a [`SnowflakeId`] because its reserved sign bit
/// (bit 63) is set.
///
/// [`SnowflakeId`]: crate::SnowflakeId
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[error("raw id {0:#x} has the reserved sign bit set")]
pub struct ReservedBitError(pub u64);

impl Error {
    /// Returns `true` for [`Error::ClockRegression`].
    pub const fn is_clock_regression(&self) -> bool {
        matches!(self, Self::ClockRegression { .. })
    }
}

#[cfg(not(feature = "parking-lot"))]
use crate::generator::{MutexGuard, PoisonError};
#[cfg(not(feature = "parking-lot"))]
// Convert all poisoned lock errors to a simplified `LockPoisoned`
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_message_names_the_bound() {
        let err = ConfigError::WorkerIdOutOfRange { value: 32, max: 31 };
        assert_eq!(
            err.to_string(),
            "worker id can't be greater than 31 or less than 0 (got 32)"
        );

        let err = ConfigError::DatacenterIdOutOfRange { value: -1, max: 31 };
        assert_eq!(
            err.to_string(),
            "datacenter id can't be greater than 31 or less than 0 (got -1)"
        );
    }

    #[test]
    fn config_error_is_transparent_inside_error() {
        let err = Error::from(ConfigError::InvalidLayout { total: 23 });
        assert_eq!(
            err.to_string(),
            "datacenter, worker and sequence bits must sum to 22 (got 23)"
        );
        assert!(!err.is_clock_regression());
    }

    #[test]
    fn clock_regression_reports_drift() {
        let err = Error::ClockRegression { drift_ms: 15 };
        assert!(err.is_clock_regression());
        assert_eq!(
            err.to_string(),
            "clock moved backwards, refusing to generate id for 15 milliseconds"
        );
    }
}
