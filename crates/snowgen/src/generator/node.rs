use crate::{ConfigError, Error, Layout, SnowflakeId, TimeSource};

/// The immutable identity half of a generator: the layout plus the validated
/// datacenter and worker IDs.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Node {
    pub(crate) layout: Layout,
    pub(crate) datacenter_id: u64,
    pub(crate) worker_id: u64,
}

impl Node {
    pub(crate) fn new(
        layout: Layout,
        worker_id: i64,
        datacenter_id: i64,
    ) -> Result<Self, ConfigError> {
        let worker_id = layout.check_worker_id(worker_id)?;
        let datacenter_id = layout.check_datacenter_id(datacenter_id)?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            timestamp_shift = Layout::TIMESTAMP_SHIFT,
            datacenter_bits = layout.datacenter_bits(),
            worker_bits = layout.worker_bits(),
            sequence_bits = layout.sequence_bits(),
            epoch = layout.epoch_millis(),
            datacenter_id,
            worker_id,
            "worker starting"
        );

        Ok(Self {
            layout,
            datacenter_id,
            worker_id,
        })
    }

    pub(crate) fn check_sequence(&self, sequence: u64) -> Result<u64, ConfigError> {
        let max = self.layout.max_sequence();
        if sequence > max {
            return Err(ConfigError::SequenceOutOfRange {
                value: sequence,
                max,
            });
        }
        Ok(sequence)
    }

    #[inline]
    pub(crate) const fn pack(&self, elapsed: u64, sequence: u64) -> SnowflakeId {
        self.layout
            .pack(elapsed, self.datacenter_id, self.worker_id, sequence)
    }
}

/// Spins until the clock strictly exceeds `last` and returns the new reading.
///
/// No timeout: a clock that never advances keeps the caller here.
#[inline]
pub(crate) fn til_next_millis<T: TimeSource>(time: &T, last: u64) -> u64 {
    loop {
        let now = time.current_millis();
        if now > last {
            return now;
        }
        core::hint::spin_loop();
    }
}

#[cold]
#[inline(never)]
pub(crate) fn cold_clock_behind(drift_ms: u64) -> Error {
    #[cfg(feature = "tracing")]
    tracing::warn!(drift_ms, "clock moved backwards, refusing to generate id");
    Error::ClockRegression { drift_ms }
}
