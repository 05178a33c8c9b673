use core::fmt;

use crate::{Components, Layout, ReservedBitError};

/// A 64-bit Snowflake ID.
///
/// The value is opaque until decoded with the [`Layout`] that issued it. IDs
/// order by their raw integer, which sorts them by timestamp, then node, then
/// sequence.
///
/// The reserved top bit is always clear, so every ID converts losslessly to a
/// non-negative `i64`.
///
/// # Example
///
/// ```
/// use snowgen::{Layout, SnowflakeId};
///
/// let id = SnowflakeId::try_from(1_234_567_890_123_456_789_i64).unwrap();
/// assert_eq!(id.to_string(), "1234567890123456789");
/// assert_eq!(i64::from(id), 1_234_567_890_123_456_789);
///
/// let parts = Layout::default().decompose(id);
/// assert!(parts.worker_id <= 31);
///
/// assert!(SnowflakeId::try_from(-1_i64).is_err());
/// ```
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnowflakeId {
    id: u64,
}

impl SnowflakeId {
    /// The reserved sign bit (bit 63).
    pub const RESERVED_MASK: u64 = 1 << 63;

    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self { id: raw }
    }

    /// Returns the raw integer.
    pub const fn to_raw(&self) -> u64 {
        self.id
    }

    /// Returns the ID as a signed integer. Never negative.
    pub const fn to_i64(&self) -> i64 {
        self.id as i64
    }

    /// Returns the ID as a zero-padded 20-digit string, which sorts
    /// lexicographically in the same order as the integer.
    pub fn to_padded_string(&self) -> String {
        format!("{:020}", self.id)
    }

    /// Splits the ID into its fields using `layout`.
    pub const fn decompose(&self, layout: &Layout) -> Components {
        layout.decompose(*self)
    }
}

impl TryFrom<u64> for SnowflakeId {
    type Error = ReservedBitError;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        if raw & Self::RESERVED_MASK != 0 {
            return Err(ReservedBitError(raw));
        }
        Ok(Self::from_raw(raw))
    }
}

impl TryFrom<i64> for SnowflakeId {
    type Error = ReservedBitError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::try_from(raw as u64)
    }
}

impl From<SnowflakeId> for u64 {
    fn from(id: SnowflakeId) -> Self {
        id.to_raw()
    }
}

impl From<SnowflakeId> for i64 {
    fn from(id: SnowflakeId) -> Self {
        id.to_i64()
    }
}

impl fmt::Display for SnowflakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl fmt::Debug for SnowflakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnowflakeId({} / {:#018x})", self.id, self.id)
    }
}

#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
#[cfg(feature = "serde")]
mod serde_impl {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::SnowflakeId;

    /// Serialized as its native integer.
    impl Serialize for SnowflakeId {
        fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            self.to_raw().serialize(s)
        }
    }

    /// Rejects integers with the reserved bit set.
    impl<'de> Deserialize<'de> for SnowflakeId {
        fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
            let raw = u64::deserialize(d)?;
            Self::try_from(raw).map_err(serde::de::Error::custom)
        }
    }
}
