use core::time::Duration;

use crate::{ConfigError, DEFAULT_EPOCH, Error, Result, SnowflakeId};

/// The bit layout and epoch shared by every ID a generator issues.
///
/// The 64 bits are split as follows (default widths shown):
///
/// ```text
///  Bit Index:  63           63 62            22 21               17 16           12 11             0
///              +--------------+----------------+-------------------+---------------+---------------+
///  Field:      | reserved (1) | timestamp (41) | datacenter ID (5) | worker ID (5) | sequence (12) |
///              +--------------+----------------+-------------------+---------------+---------------+
///              |<--------------------- MSB ---------- 64 bits ---------- LSB ---------------------->|
/// ```
///
/// The reserved bit is always zero so every ID is also a non-negative `i64`.
/// The timestamp field always keeps bits 22 through 62; only the split of the
/// lower 22 bits between datacenter, worker and sequence is configurable.
///
/// The epoch must never change once an ID has been issued under it, or newer
/// IDs may sort before older ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Layout {
    epoch: u64,
    datacenter_bits: u32,
    worker_bits: u32,
    sequence_bits: u32,
}

/// The fields of a decoded [`SnowflakeId`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Components {
    /// Milliseconds since the Unix epoch (the layout epoch is added back).
    pub timestamp: u64,
    pub datacenter_id: u64,
    pub worker_id: u64,
    pub sequence: u64,
}

const fn mask(bits: u32) -> u64 {
    (1 << bits) - 1
}

impl Layout {
    /// Width of the timestamp field.
    pub const TIMESTAMP_BITS: u32 = 41;

    /// Number of bits to shift the timestamp to its position (bit 22).
    pub const TIMESTAMP_SHIFT: u32 = 22;

    /// Bitmask for the 41-bit timestamp field before shifting.
    pub const TIMESTAMP_MASK: u64 = mask(Self::TIMESTAMP_BITS);

    /// 5 datacenter bits, 5 worker bits and 12 sequence bits measured from
    /// [`DEFAULT_EPOCH`].
    pub const DEFAULT: Self = Self {
        epoch: DEFAULT_EPOCH.as_millis() as u64,
        datacenter_bits: 5,
        worker_bits: 5,
        sequence_bits: 12,
    };

    /// Creates a layout with a custom epoch and field widths.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLayout`] unless the three widths sum to
    /// exactly 22.
    ///
    /// # Example
    ///
    /// ```
    /// use snowgen::{Layout, TWITTER_EPOCH};
    ///
    /// // 10 worker bits, no datacenter field.
    /// let layout = Layout::new(TWITTER_EPOCH, 0, 10, 12).unwrap();
    /// assert_eq!(layout.max_worker_id(), 1023);
    /// assert_eq!(layout.max_datacenter_id(), 0);
    ///
    /// assert!(Layout::new(TWITTER_EPOCH, 5, 5, 13).is_err());
    /// ```
    pub fn new(
        epoch: Duration,
        datacenter_bits: u8,
        worker_bits: u8,
        sequence_bits: u8,
    ) -> Result<Self, ConfigError> {
        let total = u32::from(datacenter_bits) + u32::from(worker_bits) + u32::from(sequence_bits);
        if total != Self::TIMESTAMP_SHIFT {
            return Err(ConfigError::InvalidLayout { total });
        }
        Ok(Self {
            epoch: epoch.as_millis() as u64,
            datacenter_bits: u32::from(datacenter_bits),
            worker_bits: u32::from(worker_bits),
            sequence_bits: u32::from(sequence_bits),
        })
    }

    /// The epoch in milliseconds since the Unix epoch.
    pub const fn epoch_millis(&self) -> u64 {
        self.epoch
    }

    pub const fn datacenter_bits(&self) -> u32 {
        self.datacenter_bits
    }

    pub const fn worker_bits(&self) -> u32 {
        self.worker_bits
    }

    pub const fn sequence_bits(&self) -> u32 {
        self.sequence_bits
    }

    /// Number of bits to shift the datacenter ID to its position.
    pub const fn datacenter_shift(&self) -> u32 {
        self.sequence_bits + self.worker_bits
    }

    /// Number of bits to shift the worker ID to its position.
    pub const fn worker_shift(&self) -> u32 {
        self.sequence_bits
    }

    pub const fn max_datacenter_id(&self) -> u64 {
        mask(self.datacenter_bits)
    }

    pub const fn max_worker_id(&self) -> u64 {
        mask(self.worker_bits)
    }

    /// Largest sequence value; one millisecond yields `max_sequence() + 1`
    /// IDs.
    pub const fn max_sequence(&self) -> u64 {
        mask(self.sequence_bits)
    }

    /// Largest representable Unix timestamp in milliseconds.
    pub const fn max_timestamp(&self) -> u64 {
        self.epoch.saturating_add(Self::TIMESTAMP_MASK)
    }

    /// Checks a worker ID against the bound of its bit field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WorkerIdOutOfRange`] if the value is negative or
    /// above [`Self::max_worker_id`].
    pub fn check_worker_id(&self, value: i64) -> Result<u64, ConfigError> {
        let max = self.max_worker_id();
        u64::try_from(value)
            .ok()
            .filter(|&id| id <= max)
            .ok_or(ConfigError::WorkerIdOutOfRange { value, max })
    }

    /// Checks a datacenter ID against the bound of its bit field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DatacenterIdOutOfRange`] if the value is
    /// negative or above [`Self::max_datacenter_id`].
    pub fn check_datacenter_id(&self, value: i64) -> Result<u64, ConfigError> {
        let max = self.max_datacenter_id();
        u64::try_from(value)
            .ok()
            .filter(|&id| id <= max)
            .ok_or(ConfigError::DatacenterIdOutOfRange { value, max })
    }

    /// Converts a Unix timestamp into milliseconds elapsed since the epoch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TimestampOutOfRange`] if the timestamp is before the
    /// epoch or too far past it for the 41-bit field.
    pub fn elapsed(&self, timestamp: u64) -> Result<u64> {
        timestamp
            .checked_sub(self.epoch)
            .filter(|&elapsed| elapsed <= Self::TIMESTAMP_MASK)
            .ok_or(Error::TimestampOutOfRange {
                timestamp,
                epoch: self.epoch,
            })
    }

    /// Packs already validated fields. `elapsed` is relative to the epoch.
    pub(crate) const fn pack(
        &self,
        elapsed: u64,
        datacenter_id: u64,
        worker_id: u64,
        sequence: u64,
    ) -> SnowflakeId {
        debug_assert!(elapsed <= Self::TIMESTAMP_MASK, "timestamp overflow");
        debug_assert!(datacenter_id <= self.max_datacenter_id(), "datacenter_id overflow");
        debug_assert!(worker_id <= self.max_worker_id(), "worker_id overflow");
        debug_assert!(sequence <= self.max_sequence(), "sequence overflow");
        SnowflakeId::from_raw(
            (elapsed << Self::TIMESTAMP_SHIFT)
                | (datacenter_id << self.datacenter_shift())
                | (worker_id << self.worker_shift())
                | sequence,
        )
    }

    /// Builds an ID from its fields, validating each against this layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TimestampOutOfRange`] for an unrepresentable
    /// timestamp, or a [`ConfigError`] for any field exceeding its width.
    pub fn compose(&self, components: Components) -> Result<SnowflakeId> {
        let elapsed = self.elapsed(components.timestamp)?;
        let datacenter_id = self.check_datacenter_id(as_signed(components.datacenter_id))?;
        let worker_id = self.check_worker_id(as_signed(components.worker_id))?;
        let max = self.max_sequence();
        if components.sequence > max {
            return Err(ConfigError::SequenceOutOfRange {
                value: components.sequence,
                max,
            }
            .into());
        }
        Ok(self.pack(elapsed, datacenter_id, worker_id, components.sequence))
    }

    /// Splits an ID into its fields. The timestamp is returned in Unix
    /// milliseconds.
    ///
    /// # Example
    ///
    /// ```
    /// use snowgen::{Components, Layout};
    ///
    /// let layout = Layout::default();
    /// let parts = Components {
    ///     timestamp: layout.epoch_millis() + 1_000,
    ///     datacenter_id: 3,
    ///     worker_id: 17,
    ///     sequence: 42,
    /// };
    /// let id = layout.compose(parts).unwrap();
    /// assert_eq!(layout.decompose(id), parts);
    /// ```
    pub const fn decompose(&self, id: SnowflakeId) -> Components {
        let raw = id.to_raw();
        Components {
            timestamp: self
                .epoch
                .saturating_add((raw >> Self::TIMESTAMP_SHIFT) & Self::TIMESTAMP_MASK),
            datacenter_id: (raw >> self.datacenter_shift()) & self.max_datacenter_id(),
            worker_id: (raw >> self.worker_shift()) & self.max_worker_id(),
            sequence: raw & self.max_sequence(),
        }
    }
}

// Saturate so oversized values still fail the bound check instead of
// wrapping negative.
fn as_signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl Default for Layout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_matches_classic_snowflake() {
        let layout = Layout::default();
        assert_eq!(layout.epoch_millis(), 1_577_808_000_000);
        assert_eq!(layout.max_datacenter_id(), 31);
        assert_eq!(layout.max_worker_id(), 31);
        assert_eq!(layout.max_sequence(), 4095);
        assert_eq!(layout.worker_shift(), 12);
        assert_eq!(layout.datacenter_shift(), 17);
        assert_eq!(Layout::TIMESTAMP_SHIFT, 22);
    }

    #[test]
    fn widths_must_fill_the_low_bits() {
        assert_eq!(
            Layout::new(DEFAULT_EPOCH, 5, 5, 11),
            Err(ConfigError::InvalidLayout { total: 21 })
        );
        assert_eq!(
            Layout::new(DEFAULT_EPOCH, 8, 8, 8),
            Err(ConfigError::InvalidLayout { total: 24 })
        );
        assert!(Layout::new(DEFAULT_EPOCH, 0, 0, 22).is_ok());
    }

    #[test]
    fn ids_are_checked_against_their_own_bound() {
        let layout = Layout::new(DEFAULT_EPOCH, 3, 7, 12).unwrap();
        assert_eq!(layout.check_worker_id(127), Ok(127));
        assert_eq!(
            layout.check_worker_id(128),
            Err(ConfigError::WorkerIdOutOfRange { value: 128, max: 127 })
        );
        assert_eq!(layout.check_datacenter_id(7), Ok(7));
        // A datacenter value that would pass the worker bound still fails.
        assert_eq!(
            layout.check_datacenter_id(8),
            Err(ConfigError::DatacenterIdOutOfRange { value: 8, max: 7 })
        );
        assert_eq!(
            layout.check_datacenter_id(-1),
            Err(ConfigError::DatacenterIdOutOfRange { value: -1, max: 7 })
        );
    }

    #[test]
    fn packs_fields_at_fixed_positions() {
        let layout = Layout::default();
        let id = layout.pack(1, 2, 3, 4);
        assert_eq!(id.to_raw(), (1 << 22) | (2 << 17) | (3 << 12) | 4);

        let id = layout.pack(Layout::TIMESTAMP_MASK, 31, 31, 4095);
        assert_eq!(id.to_raw(), i64::MAX as u64);
        assert!(id.to_i64() > 0);
    }

    #[test]
    fn elapsed_rejects_timestamps_outside_the_field() {
        let layout = Layout::default();
        let epoch = layout.epoch_millis();
        assert_eq!(layout.elapsed(epoch), Ok(0));
        assert_eq!(layout.elapsed(layout.max_timestamp()), Ok(Layout::TIMESTAMP_MASK));
        assert_eq!(
            layout.elapsed(epoch - 1),
            Err(Error::TimestampOutOfRange {
                timestamp: epoch - 1,
                epoch
            })
        );
        assert!(layout.elapsed(layout.max_timestamp() + 1).is_err());
    }

    #[test]
    fn compose_validates_every_field() {
        let layout = Layout::default();
        let ok = Components {
            timestamp: layout.epoch_millis() + 5,
            datacenter_id: 1,
            worker_id: 2,
            sequence: 3,
        };
        assert!(layout.compose(ok).is_ok());
        assert_eq!(
            layout.compose(Components { worker_id: 32, ..ok }),
            Err(ConfigError::WorkerIdOutOfRange { value: 32, max: 31 }.into())
        );
        assert_eq!(
            layout.compose(Components {
                datacenter_id: u64::MAX,
                ..ok
            }),
            Err(ConfigError::DatacenterIdOutOfRange {
                value: i64::MAX,
                max: 31
            }
            .into())
        );
        assert_eq!(
            layout.compose(Components { sequence: 4096, ..ok }),
            Err(ConfigError::SequenceOutOfRange {
                value: 4096,
                max: 4095
            }
            .into())
        );
    }
}
