//! Coordinator-free, time-ordered 64-bit Snowflake IDs.
//!
//! Every ID packs the milliseconds elapsed since a fixed epoch, a datacenter
//! ID, a worker ID and a per-millisecond sequence into one integer:
//!
//! ```text
//! 0 | 41-bit timestamp | 5-bit datacenter | 5-bit worker | 12-bit sequence
//! ```
//!
//! As long as each live generator owns a distinct `(worker, datacenter)`
//! pair, IDs are unique across the fleet without any network round-trip. A
//! single generator issues up to 4096 IDs per millisecond and refuses to
//! issue any while the clock is behind its last timestamp.
//!
//! ```
//! use snowgen::{LockSnowflakeGenerator, SnowflakeGenerator};
//!
//! let generator = LockSnowflakeGenerator::new(1, 1).unwrap();
//! let first = generator.try_next_id().unwrap();
//! let second = generator.try_next_id().unwrap();
//! assert!(second > first);
//! ```
//!
//! ## Feature flags
//!
//! - `parking-lot`: use `parking_lot`'s non-poisoning mutex.
//! - `cache-padded`: pad shared generator state to a cache line.
//! - `serde`: (de)serialize [`SnowflakeId`] as its native integer.
//! - `tracing`: emit `tracing` events on construction and clock regression,
//!   and trace spans around issuance.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
mod generator;
mod id;
mod time;

pub use crate::error::*;
pub use crate::generator::*;
pub use crate::id::*;
pub use crate::time::*;
