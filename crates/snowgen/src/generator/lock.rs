use core::cmp::Ordering;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    ConfigError, IdGenStatus, Layout, Result, SnowflakeGenerator, SnowflakeId, SystemClock,
    TimeSource,
    generator::{
        Mutex, MutexGuard,
        node::{Node, cold_clock_behind, til_next_millis},
    },
};

/// Mutable half of a [`LockSnowflakeGenerator`].
#[derive(Clone, Copy, Debug, Default)]
struct State {
    /// Unix milliseconds of the last issued ID, zero before the first one.
    last_timestamp: u64,
    sequence: u64,
}

/// A lock-based Snowflake ID generator suitable for multi-threaded
/// environments.
///
/// One mutex guards the whole issuance step: the clock read, the comparison
/// with the last timestamp, the sequence update and the write-back happen as
/// a single unit, so two threads can never observe the same state. Share it
/// across threads behind an `Arc` or a `static`.
///
/// When 4096 IDs (with the default layout) have been issued within one
/// millisecond, [`Self::try_next_id`] busy-waits **while holding the lock**
/// until the clock advances.
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ Strict issue order follows lock acquisition
///
/// ## Recommended When
/// - You're in a multi-threaded environment
/// - Fair access across threads is important
/// - Your target doesn't support 64-bit atomics
///
/// ## See Also
/// - [`AtomicSnowflakeGenerator`]
///
/// [`AtomicSnowflakeGenerator`]: crate::AtomicSnowflakeGenerator
#[derive(Debug)]
pub struct LockSnowflakeGenerator<T = SystemClock>
where
    T: TimeSource,
{
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<Mutex<State>>,
    #[cfg(not(feature = "cache-padded"))]
    state: Mutex<State>,
    node: Node,
    time: T,
}

impl LockSnowflakeGenerator<SystemClock> {
    /// Creates a generator using the [`SystemClock`] and the default
    /// [`Layout`] (5 datacenter bits, 5 worker bits, 12 sequence bits).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if either ID is negative or above 31.
    ///
    /// # Example
    ///
    /// ```
    /// use snowgen::{ConfigError, LockSnowflakeGenerator, SnowflakeGenerator};
    ///
    /// let generator = LockSnowflakeGenerator::new(7, 3).unwrap();
    /// let id = generator.try_next_id().unwrap();
    ///
    /// let parts = generator.decompose(id);
    /// assert_eq!(parts.worker_id, 7);
    /// assert_eq!(parts.datacenter_id, 3);
    ///
    /// assert_eq!(
    ///     LockSnowflakeGenerator::new(32, 0).unwrap_err(),
    ///     ConfigError::WorkerIdOutOfRange { value: 32, max: 31 },
    /// );
    /// ```
    pub fn new(worker_id: i64, datacenter_id: i64) -> Result<Self, ConfigError> {
        Self::with_time_source(worker_id, datacenter_id, SystemClock)
    }
}

impl<T> LockSnowflakeGenerator<T>
where
    T: TimeSource,
{
    /// Creates a generator with the default [`Layout`] reading time from
    /// `time`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if either ID is negative or above 31.
    pub fn with_time_source(
        worker_id: i64,
        datacenter_id: i64,
        time: T,
    ) -> Result<Self, ConfigError> {
        Self::with_layout(Layout::default(), worker_id, datacenter_id, time)
    }

    /// Creates a generator with a custom [`Layout`].
    ///
    /// The last timestamp and the sequence both start at zero.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if either ID is negative or does not fit its
    /// field in `layout`.
    pub fn with_layout(
        layout: Layout,
        worker_id: i64,
        datacenter_id: i64,
        time: T,
    ) -> Result<Self, ConfigError> {
        Self::from_components(layout, 0, worker_id, datacenter_id, 0, time)
    }

    /// Creates a generator from explicit state.
    ///
    /// This constructor is useful for restoring the last timestamp and
    /// sequence from persistent storage, or controlling the starting point of
    /// the generator manually.
    ///
    /// # Parameters
    /// - `last_timestamp`: Unix milliseconds of the last issued ID
    /// - `sequence`: The sequence of the last issued ID
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if an ID or the sequence does not fit its
    /// field in `layout`.
    ///
    /// # ⚠️ Note
    /// In typical use cases, you should prefer [`Self::new`].
    pub fn from_components(
        layout: Layout,
        last_timestamp: u64,
        worker_id: i64,
        datacenter_id: i64,
        sequence: u64,
        time: T,
    ) -> Result<Self, ConfigError> {
        let node = Node::new(layout, worker_id, datacenter_id)?;
        let state = Mutex::new(State {
            last_timestamp,
            sequence: node.check_sequence(sequence)?,
        });
        Ok(Self {
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(state),
            #[cfg(not(feature = "cache-padded"))]
            state,
            node,
            time,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        #[cfg(feature = "parking-lot")]
        {
            Ok(self.state.lock())
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            Ok(self.state.lock()?)
        }
    }

    /// Generates the next ID, busy-waiting when the millisecond is
    /// exhausted.
    ///
    /// # Errors
    ///
    /// See [`SnowflakeGenerator::try_next_id`].
    ///
    /// # Example
    /// ```
    /// use snowgen::{Error, LockSnowflakeGenerator};
    ///
    /// let generator = LockSnowflakeGenerator::new(0, 0).unwrap();
    ///
    /// match generator.try_next_id() {
    ///     Ok(id) => println!("{id}"),
    ///     Err(Error::ClockRegression { drift_ms }) => {
    ///         eprintln!("clock is {drift_ms} ms behind, retry later")
    ///     }
    ///     Err(e) => panic!("generator error: {e}"),
    /// }
    /// ```
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_next_id(&self) -> Result<SnowflakeId> {
        let layout = &self.node.layout;
        let mut state = self.lock()?;

        let now = self.time.current_millis();
        let (timestamp, sequence) = match now.cmp(&state.last_timestamp) {
            Ordering::Less => return Err(cold_clock_behind(state.last_timestamp - now)),
            Ordering::Equal => {
                let sequence = (state.sequence + 1) & layout.max_sequence();
                if sequence == 0 {
                    (til_next_millis(&self.time, state.last_timestamp), 0)
                } else {
                    (now, sequence)
                }
            }
            Ordering::Greater => (now, 0),
        };
        let elapsed = layout.elapsed(timestamp)?;

        state.last_timestamp = timestamp;
        state.sequence = sequence;
        Ok(self.node.pack(elapsed, sequence))
    }

    /// Attempts to generate the next ID without blocking.
    ///
    /// # Errors
    ///
    /// See [`SnowflakeGenerator::try_poll_id`].
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_poll_id(&self) -> Result<IdGenStatus> {
        let layout = &self.node.layout;
        let mut state = self.lock()?;

        let now = self.time.current_millis();
        let sequence = match now.cmp(&state.last_timestamp) {
            Ordering::Less => return Err(cold_clock_behind(state.last_timestamp - now)),
            Ordering::Equal if state.sequence < layout.max_sequence() => state.sequence + 1,
            Ordering::Equal => {
                return Ok(IdGenStatus::Pending {
                    yield_until: state.last_timestamp + 1,
                });
            }
            Ordering::Greater => 0,
        };
        let elapsed = layout.elapsed(now)?;

        state.last_timestamp = now;
        state.sequence = sequence;
        Ok(IdGenStatus::Ready {
            id: self.node.pack(elapsed, sequence),
        })
    }
}

impl<T> SnowflakeGenerator for LockSnowflakeGenerator<T>
where
    T: TimeSource,
{
    fn layout(&self) -> &Layout {
        &self.node.layout
    }

    fn worker_id(&self) -> u64 {
        self.node.worker_id
    }

    fn datacenter_id(&self) -> u64 {
        self.node.datacenter_id
    }

    fn try_next_id(&self) -> Result<SnowflakeId> {
        self.try_next_id()
    }

    fn try_poll_id(&self) -> Result<IdGenStatus> {
        self.try_poll_id()
    }
}
