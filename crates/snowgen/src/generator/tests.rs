use crate::{
    AtomicSnowflakeGenerator, ConfigError, DEFAULT_EPOCH, Error, IdGenStatus, Layout,
    LockSnowflakeGenerator, MonotonicClock, SnowflakeGenerator, SnowflakeId, SystemClock,
    TimeSource,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, scope};
use std::time::Duration;

const BASE: u64 = DEFAULT_EPOCH.as_millis() as u64 + 42;

/// A clock the test moves by hand.
struct MockTime {
    millis: AtomicU64,
}

impl MockTime {
    fn new(millis: u64) -> Arc<Self> {
        Arc::new(Self {
            millis: AtomicU64::new(millis),
        })
    }

    fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl TimeSource for MockTime {
    fn current_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Reports `base` for the first `reads` reads, `base + 1` afterwards.
struct StepAfter {
    base: u64,
    reads: u64,
    count: AtomicU64,
}

impl StepAfter {
    fn new(base: u64, reads: u64) -> Self {
        Self {
            base,
            reads,
            count: AtomicU64::new(0),
        }
    }
}

impl TimeSource for StepAfter {
    fn current_millis(&self) -> u64 {
        if self.count.fetch_add(1, Ordering::SeqCst) < self.reads {
            self.base
        } else {
            self.base + 1
        }
    }
}

trait IdGenStatusExt {
    fn unwrap_ready(self) -> SnowflakeId;
    fn unwrap_pending(self) -> u64;
}

impl IdGenStatusExt for IdGenStatus {
    fn unwrap_ready(self) -> SnowflakeId {
        match self {
            Self::Ready { id } => id,
            Self::Pending { yield_until } => {
                panic!("unexpected pending (yield until: {yield_until})")
            }
        }
    }

    fn unwrap_pending(self) -> u64 {
        match self {
            Self::Ready { id } => panic!("unexpected ready ({id})"),
            Self::Pending { yield_until } => yield_until,
        }
    }
}

fn run_id_sequence_increments_within_same_tick<G: SnowflakeGenerator>(generator: &G) {
    let id1 = generator.try_next_id().unwrap();
    let id2 = generator.try_next_id().unwrap();
    let id3 = generator.try_next_id().unwrap();

    let [p1, p2, p3] = [id1, id2, id3].map(|id| generator.decompose(id));
    assert_eq!(p1.timestamp, BASE);
    assert_eq!(p2.timestamp, BASE);
    assert_eq!(p3.timestamp, BASE);
    assert_eq!(p1.sequence, 0);
    assert_eq!(p2.sequence, 1);
    assert_eq!(p3.sequence, 2);
    assert!(id1 < id2 && id2 < id3);
}

fn run_generator_handles_rollover<G: SnowflakeGenerator>(generator: &G) {
    let max = generator.layout().max_sequence();
    for i in 0..=max {
        let parts = generator.decompose(generator.try_next_id().unwrap());
        assert_eq!(parts.sequence, i);
        assert_eq!(parts.timestamp, BASE);
    }

    // The budget for BASE is spent; this call spins until the clock moves.
    let parts = generator.decompose(generator.try_next_id().unwrap());
    assert_eq!(parts.timestamp, BASE + 1);
    assert_eq!(parts.sequence, 0);
}

fn run_generator_pending_when_exhausted<G: SnowflakeGenerator>(generator: &G, clock: &MockTime) {
    assert_eq!(generator.try_poll_id().unwrap().unwrap_pending(), BASE + 1);
    // Polling leaves the state untouched.
    assert_eq!(generator.try_poll_id().unwrap().unwrap_pending(), BASE + 1);

    clock.set(BASE + 1);
    let parts = generator.decompose(generator.try_poll_id().unwrap().unwrap_ready());
    assert_eq!(parts.timestamp, BASE + 1);
    assert_eq!(parts.sequence, 0);
}

fn run_generator_refuses_clock_regression<G: SnowflakeGenerator>(generator: &G, clock: &MockTime) {
    clock.set(BASE + 100);
    let first = generator.try_next_id().unwrap();

    clock.set(BASE + 90);
    assert_eq!(
        generator.try_next_id(),
        Err(Error::ClockRegression { drift_ms: 10 })
    );
    assert_eq!(
        generator.try_poll_id(),
        Err(Error::ClockRegression { drift_ms: 10 })
    );

    // State was not touched: the same millisecond continues its sequence.
    clock.set(BASE + 100);
    let second = generator.try_next_id().unwrap();
    let parts = generator.decompose(second);
    assert_eq!(parts.timestamp, BASE + 100);
    assert_eq!(parts.sequence, 1);
    assert!(second > first);

    clock.set(BASE + 101);
    let parts = generator.decompose(generator.try_next_id().unwrap());
    assert_eq!(parts.timestamp, BASE + 101);
    assert_eq!(parts.sequence, 0);
}

fn run_generator_rejects_clock_before_epoch<G: SnowflakeGenerator>(
    generator: &G,
    clock: &MockTime,
) {
    let epoch = generator.layout().epoch_millis();
    clock.set(epoch - 1);
    assert_eq!(
        generator.try_next_id(),
        Err(Error::TimestampOutOfRange {
            timestamp: epoch - 1,
            epoch
        })
    );

    clock.set(BASE);
    assert!(generator.try_next_id().is_ok());
}

// A backward step is a regression even when it lands before the epoch.
fn run_generator_regression_below_epoch<G: SnowflakeGenerator>(generator: &G, clock: &MockTime) {
    let epoch = generator.layout().epoch_millis();
    clock.set(epoch + 5);
    generator.try_next_id().unwrap();

    clock.set(epoch - 5);
    assert_eq!(
        generator.try_next_id(),
        Err(Error::ClockRegression { drift_ms: 10 })
    );
    assert_eq!(
        generator.try_poll_id(),
        Err(Error::ClockRegression { drift_ms: 10 })
    );

    clock.set(epoch + 5);
    let parts = generator.decompose(generator.try_next_id().unwrap());
    assert_eq!(parts.timestamp, epoch + 5);
    assert_eq!(parts.sequence, 1);
}

fn run_generator_first_id_at_epoch<G: SnowflakeGenerator>(generator: &G) {
    let max = generator.layout().max_sequence();
    let epoch = generator.layout().epoch_millis();
    for i in 0..=max {
        let parts = generator.decompose(generator.try_poll_id().unwrap().unwrap_ready());
        assert_eq!(parts.timestamp, epoch);
        assert_eq!(parts.sequence, i);
    }
    assert_eq!(generator.try_poll_id().unwrap().unwrap_pending(), epoch + 1);
}

fn run_generator_embeds_identity<G: SnowflakeGenerator>(generator: &G) {
    let before = SystemClock.current_millis();
    for _ in 0..1_000 {
        let id = generator.try_next_id().unwrap();
        let parts = generator.decompose(id);
        assert_eq!(parts.worker_id, generator.worker_id());
        assert_eq!(parts.datacenter_id, generator.datacenter_id());
        assert!(parts.timestamp >= before);
        assert!(id.to_i64() > 0);
    }
}

fn run_generator_monotonic<G: SnowflakeGenerator>(generator: &G) {
    const TOTAL_IDS: usize = 4096 * 64;

    let mut last = generator.try_next_id().unwrap();
    let mut parts_last = generator.decompose(last);

    for _ in 0..TOTAL_IDS {
        let id = generator.try_next_id().unwrap();
        let parts = generator.decompose(id);

        assert!(id > last);
        assert!(parts.timestamp >= parts_last.timestamp);
        if parts.timestamp == parts_last.timestamp {
            assert_eq!(parts.sequence, parts_last.sequence + 1);
        } else {
            assert_eq!(parts.sequence, 0);
        }

        last = id;
        parts_last = parts;
    }
}

fn run_generator_unique_threaded<G>(generator: &G)
where
    G: SnowflakeGenerator + Sync,
{
    const THREADS: usize = 100;
    const IDS_PER_THREAD: usize = 10_000;
    const TOTAL_IDS: usize = THREADS * IDS_PER_THREAD;

    let batches: Vec<Vec<SnowflakeId>> = scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    (0..IDS_PER_THREAD)
                        .map(|_| generator.try_next_id().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut seen = HashSet::with_capacity(TOTAL_IDS);
    for batch in &batches {
        // Each thread observes its own IDs in issue order.
        assert!(batch.windows(2).all(|w| w[0] < w[1]));
        seen.extend(batch.iter().copied());
    }
    assert_eq!(seen.len(), TOTAL_IDS, "Expected {TOTAL_IDS} unique IDs");
}

fn run_generator_blocks_on_stalled_clock<G>(generator: Arc<G>, clock: &MockTime)
where
    G: SnowflakeGenerator + Send + Sync + 'static,
{
    let waiter = {
        let generator = Arc::clone(&generator);
        thread::spawn(move || generator.try_next_id())
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!waiter.is_finished(), "issuance returned on a stalled clock");

    clock.set(BASE + 1);
    let id = waiter.join().unwrap().unwrap();
    let parts = generator.decompose(id);
    assert_eq!(parts.timestamp, BASE + 1);
    assert_eq!(parts.sequence, 0);
}

#[test]
fn constructors_accept_every_identity_in_range() {
    for worker_id in 0..=31 {
        for datacenter_id in 0..=31 {
            let generator = LockSnowflakeGenerator::new(worker_id, datacenter_id).unwrap();
            assert_eq!(generator.worker_id(), worker_id as u64);
            assert_eq!(generator.datacenter_id(), datacenter_id as u64);
            assert!(AtomicSnowflakeGenerator::new(worker_id, datacenter_id).is_ok());
        }
    }
}

#[test]
fn constructors_reject_identities_out_of_range() {
    for value in [-1, 32, i64::MIN, i64::MAX] {
        assert_eq!(
            LockSnowflakeGenerator::new(value, 0).unwrap_err(),
            ConfigError::WorkerIdOutOfRange { value, max: 31 }
        );
        assert_eq!(
            LockSnowflakeGenerator::new(0, value).unwrap_err(),
            ConfigError::DatacenterIdOutOfRange { value, max: 31 }
        );
        assert_eq!(
            AtomicSnowflakeGenerator::new(value, 0).unwrap_err(),
            ConfigError::WorkerIdOutOfRange { value, max: 31 }
        );
        assert_eq!(
            AtomicSnowflakeGenerator::new(0, value).unwrap_err(),
            ConfigError::DatacenterIdOutOfRange { value, max: 31 }
        );
    }
}

#[test]
fn from_components_rejects_sequence_out_of_range() {
    let err =
        LockSnowflakeGenerator::from_components(Layout::default(), BASE, 0, 0, 4096, SystemClock)
            .unwrap_err();
    assert_eq!(err, ConfigError::SequenceOutOfRange { value: 4096, max: 4095 });

    let err =
        AtomicSnowflakeGenerator::from_components(Layout::default(), BASE, 0, 0, 4096, SystemClock)
            .unwrap_err();
    assert_eq!(err, ConfigError::SequenceOutOfRange { value: 4096, max: 4095 });
}

#[test]
fn custom_layout_widens_the_worker_field() {
    let layout = Layout::new(DEFAULT_EPOCH, 0, 10, 12).unwrap();
    let generator = LockSnowflakeGenerator::with_layout(layout, 1023, 0, SystemClock).unwrap();
    run_generator_embeds_identity(&generator);

    assert_eq!(
        LockSnowflakeGenerator::with_layout(layout, 0, 1, SystemClock).unwrap_err(),
        ConfigError::DatacenterIdOutOfRange { value: 1, max: 0 }
    );
}

#[test]
fn lock_generator_sequence_test() {
    let generator = LockSnowflakeGenerator::with_time_source(0, 0, MockTime::new(BASE)).unwrap();
    run_id_sequence_increments_within_same_tick(&generator);
}

#[test]
fn atomic_generator_sequence_test() {
    let generator = AtomicSnowflakeGenerator::with_time_source(0, 0, MockTime::new(BASE)).unwrap();
    run_id_sequence_increments_within_same_tick(&generator);
}

#[test]
fn lock_generator_rollover_test() {
    let generator =
        LockSnowflakeGenerator::with_time_source(1, 2, StepAfter::new(BASE, 4097)).unwrap();
    run_generator_handles_rollover(&generator);
}

#[test]
fn atomic_generator_rollover_test() {
    let generator =
        AtomicSnowflakeGenerator::with_time_source(1, 2, StepAfter::new(BASE, 4097)).unwrap();
    run_generator_handles_rollover(&generator);
}

#[test]
fn lock_generator_pending_test() {
    let clock = MockTime::new(BASE);
    let generator = LockSnowflakeGenerator::from_components(
        Layout::default(),
        BASE,
        0,
        0,
        4095,
        Arc::clone(&clock),
    )
    .unwrap();
    run_generator_pending_when_exhausted(&generator, &clock);
}

#[test]
fn atomic_generator_pending_test() {
    let clock = MockTime::new(BASE);
    let generator = AtomicSnowflakeGenerator::from_components(
        Layout::default(),
        BASE,
        0,
        0,
        4095,
        Arc::clone(&clock),
    )
    .unwrap();
    run_generator_pending_when_exhausted(&generator, &clock);
}

#[test]
fn lock_generator_clock_regression_test() {
    let clock = MockTime::new(BASE);
    let generator = LockSnowflakeGenerator::with_time_source(3, 4, Arc::clone(&clock)).unwrap();
    run_generator_refuses_clock_regression(&generator, &clock);
}

#[test]
fn atomic_generator_clock_regression_test() {
    let clock = MockTime::new(BASE);
    let generator = AtomicSnowflakeGenerator::with_time_source(3, 4, Arc::clone(&clock)).unwrap();
    run_generator_refuses_clock_regression(&generator, &clock);
}

#[test]
fn lock_generator_before_epoch_test() {
    let clock = MockTime::new(BASE);
    let generator = LockSnowflakeGenerator::with_time_source(0, 0, Arc::clone(&clock)).unwrap();
    run_generator_rejects_clock_before_epoch(&generator, &clock);
}

#[test]
fn atomic_generator_before_epoch_test() {
    let clock = MockTime::new(BASE);
    let generator = AtomicSnowflakeGenerator::with_time_source(0, 0, Arc::clone(&clock)).unwrap();
    run_generator_rejects_clock_before_epoch(&generator, &clock);
}

#[test]
fn generators_embed_identity_in_every_id() {
    for (worker_id, datacenter_id) in [(0, 0), (31, 0), (0, 31), (31, 31), (5, 17)] {
        run_generator_embeds_identity(
            &LockSnowflakeGenerator::new(worker_id, datacenter_id).unwrap(),
        );
        run_generator_embeds_identity(
            &AtomicSnowflakeGenerator::new(worker_id, datacenter_id).unwrap(),
        );
    }
}

#[test]
fn lock_generator_system_clock_monotonic() {
    let generator = LockSnowflakeGenerator::new(1, 1).unwrap();
    run_generator_monotonic(&generator);
}

#[test]
fn atomic_generator_system_clock_monotonic() {
    let generator = AtomicSnowflakeGenerator::new(1, 1).unwrap();
    run_generator_monotonic(&generator);
}

#[test]
fn lock_generator_monotonic_clock_monotonic() {
    let generator = LockSnowflakeGenerator::with_time_source(1, 1, MonotonicClock::new()).unwrap();
    run_generator_monotonic(&generator);
}

#[test]
fn atomic_generator_monotonic_clock_monotonic() {
    let generator =
        AtomicSnowflakeGenerator::with_time_source(1, 1, MonotonicClock::new()).unwrap();
    run_generator_monotonic(&generator);
}

#[test]
fn lock_generator_threaded_unique() {
    let generator = LockSnowflakeGenerator::new(0, 0).unwrap();
    run_generator_unique_threaded(&generator);
}

#[test]
fn atomic_generator_threaded_unique() {
    let generator = AtomicSnowflakeGenerator::new(0, 0).unwrap();
    run_generator_unique_threaded(&generator);
}

#[test]
fn lock_generator_blocks_on_stalled_clock() {
    let clock = MockTime::new(BASE);
    let generator = LockSnowflakeGenerator::from_components(
        Layout::default(),
        BASE,
        0,
        0,
        4095,
        Arc::clone(&clock),
    )
    .unwrap();
    run_generator_blocks_on_stalled_clock(Arc::new(generator), &clock);
}

#[test]
fn atomic_generator_blocks_on_stalled_clock() {
    let clock = MockTime::new(BASE);
    let generator = AtomicSnowflakeGenerator::from_components(
        Layout::default(),
        BASE,
        0,
        0,
        4095,
        Arc::clone(&clock),
    )
    .unwrap();
    run_generator_blocks_on_stalled_clock(Arc::new(generator), &clock);
}

fn layout_with_epoch_at(millis: u64) -> Layout {
    Layout::new(Duration::from_millis(millis), 5, 5, 12).unwrap()
}

#[test]
fn lock_generator_regression_below_epoch_test() {
    let clock = MockTime::new(BASE);
    let generator =
        LockSnowflakeGenerator::with_layout(layout_with_epoch_at(BASE), 0, 0, Arc::clone(&clock))
            .unwrap();
    run_generator_regression_below_epoch(&generator, &clock);
}

#[test]
fn atomic_generator_regression_below_epoch_test() {
    let clock = MockTime::new(BASE);
    let generator =
        AtomicSnowflakeGenerator::with_layout(layout_with_epoch_at(BASE), 0, 0, Arc::clone(&clock))
            .unwrap();
    run_generator_regression_below_epoch(&generator, &clock);
}

#[test]
fn lock_generator_first_id_at_epoch_test() {
    let epoch = DEFAULT_EPOCH.as_millis() as u64;
    let generator = LockSnowflakeGenerator::with_time_source(0, 0, MockTime::new(epoch)).unwrap();
    run_generator_first_id_at_epoch(&generator);
}

#[test]
fn atomic_generator_first_id_at_epoch_test() {
    let epoch = DEFAULT_EPOCH.as_millis() as u64;
    let generator =
        AtomicSnowflakeGenerator::with_time_source(0, 0, MockTime::new(epoch)).unwrap();
    run_generator_first_id_at_epoch(&generator);
}

#[test]
fn atomic_generator_restored_before_epoch_starts_fresh() {
    let clock = MockTime::new(BASE);
    let generator = AtomicSnowflakeGenerator::from_components(
        Layout::default(),
        0,
        0,
        0,
        4095,
        Arc::clone(&clock),
    )
    .unwrap();
    let parts = generator.decompose(generator.try_next_id().unwrap());
    assert_eq!(parts.timestamp, BASE);
    assert_eq!(parts.sequence, 0);
}
