use portable_atomic::{AtomicU64, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    ConfigError, IdGenStatus, Layout, Result, SnowflakeGenerator, SnowflakeId, SystemClock,
    TimeSource,
    generator::node::{Node, cold_clock_behind, til_next_millis},
};

/// A lock-free Snowflake ID generator suitable for multi-threaded
/// environments.
///
/// The last issued timestamp and sequence are packed into one [`AtomicU64`]
/// laid out like an ID with zeroed node bits, with an all-zero word meaning
/// nothing has been issued yet. Every issuance decides the next
/// `(timestamp, sequence)` pair from a snapshot and publishes it with a single
/// compare-and-swap; a lost race simply retries against the fresh state. No
/// two threads can therefore publish the same pair.
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ Never blocks on a lock holder
/// - ❌ No fairness: a thread can lose the CAS race repeatedly
///
/// ## Recommended When
/// - You're in a multi-threaded environment
/// - Fair access is sacrificed for higher throughput
///
/// ## See Also
/// - [`LockSnowflakeGenerator`]
///
/// [`LockSnowflakeGenerator`]: crate::LockSnowflakeGenerator
#[derive(Debug)]
pub struct AtomicSnowflakeGenerator<T = SystemClock>
where
    T: TimeSource,
{
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<AtomicU64>,
    #[cfg(not(feature = "cache-padded"))]
    state: AtomicU64,
    node: Node,
    time: T,
}

impl AtomicSnowflakeGenerator<SystemClock> {
    /// Creates a generator using the [`SystemClock`] and the default
    /// [`Layout`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if either ID is negative or above 31.
    ///
    /// # Example
    ///
    /// ```
    /// use snowgen::AtomicSnowflakeGenerator;
    ///
    /// let generator = AtomicSnowflakeGenerator::new(1, 2).unwrap();
    /// let a = generator.try_next_id().unwrap();
    /// let b = generator.try_next_id().unwrap();
    /// assert!(b > a);
    /// ```
    pub fn new(worker_id: i64, datacenter_id: i64) -> Result<Self, ConfigError> {
        Self::with_time_source(worker_id, datacenter_id, SystemClock)
    }
}

impl<T> AtomicSnowflakeGenerator<T>
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
    /// `last_timestamp` is in Unix milliseconds. A value before the layout
    /// epoch (such as `0`) means no ID has been issued yet.
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
        let sequence = node.check_sequence(sequence)?;
        let initial = last_timestamp
            .checked_sub(layout.epoch_millis())
            .map_or(Self::UNSET, |elapsed| {
                Self::pack_state(elapsed.min(Layout::TIMESTAMP_MASK), sequence)
            });
        Ok(Self {
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(AtomicU64::new(initial)),
            #[cfg(not(feature = "cache-padded"))]
            state: AtomicU64::new(initial),
            node,
            time,
        })
    }

    /// State word before the first ID is issued.
    const UNSET: u64 = 0;

    // The timestamp half holds `elapsed + 1` so that zero stays free for
    // `UNSET`. Even the largest elapsed value still fits below bit 64.
    const fn pack_state(elapsed: u64, sequence: u64) -> u64 {
        ((elapsed + 1) << Layout::TIMESTAMP_SHIFT) | sequence
    }

    /// Splits a state word into the Unix milliseconds of the last issued ID
    /// (`None` before the first) and its sequence.
    fn unpack_state(&self, raw: u64) -> (Option<u64>, u64) {
        let layout = &self.node.layout;
        let last = (raw >> Layout::TIMESTAMP_SHIFT)
            .checked_sub(1)
            .map(|elapsed| layout.epoch_millis().saturating_add(elapsed));
        (last, raw & layout.max_sequence())
    }

    /// Generates the next ID, busy-waiting when the millisecond is
    /// exhausted.
    ///
    /// # Errors
    ///
    /// See [`SnowflakeGenerator::try_next_id`].
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_next_id(&self) -> Result<SnowflakeId> {
        let layout = &self.node.layout;
        loop {
            let current = self.state.load(Ordering::Relaxed);
            let (last, last_sequence) = self.unpack_state(current);

            let now = self.time.current_millis();
            let (timestamp, sequence) = match last {
                Some(last) if now < last => return Err(cold_clock_behind(last - now)),
                Some(last) if now == last && last_sequence < layout.max_sequence() => {
                    (now, last_sequence + 1)
                }
                Some(last) if now == last => (til_next_millis(&self.time, now), 0),
                _ => (now, 0),
            };
            let elapsed = layout.elapsed(timestamp)?;

            if self
                .state
                .compare_exchange(
                    current,
                    Self::pack_state(elapsed, sequence),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                return Ok(self.node.pack(elapsed, sequence));
            }
            // Another thread won the race; retry against its state.
            core::hint::spin_loop();
        }
    }

    /// Attempts to generate the next ID without blocking on an exhausted
    /// millisecond.
    ///
    /// A lost CAS race is retried immediately rather than reported as
    /// pending.
    ///
    /// # Errors
    ///
    /// See [`SnowflakeGenerator::try_poll_id`].
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_poll_id(&self) -> Result<IdGenStatus> {
        let layout = &self.node.layout;
        loop {
            let current = self.state.load(Ordering::Relaxed);
            let (last, last_sequence) = self.unpack_state(current);

            let now = self.time.current_millis();
            let sequence = match last {
                Some(last) if now < last => return Err(cold_clock_behind(last - now)),
                Some(last) if now == last && last_sequence < layout.max_sequence() => {
                    last_sequence + 1
                }
                Some(last) if now == last => {
                    return Ok(IdGenStatus::Pending {
                        yield_until: now + 1,
                    });
                }
                _ => 0,
            };
            let elapsed = layout.elapsed(now)?;

            if self
                .state
                .compare_exchange(
                    current,
                    Self::pack_state(elapsed, sequence),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                return Ok(IdGenStatus::Ready {
                    id: self.node.pack(elapsed, sequence),
                });
            }
            core::hint::spin_loop();
        }
    }
}

impl<T> SnowflakeGenerator for AtomicSnowflakeGenerator<T>
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
