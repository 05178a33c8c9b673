#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::Parser;
use config::{CliArgs, CliConfig, ClockKind, Command, GeneratorKind};
use snowgen::{
    AtomicSnowflakeGenerator, Error, Layout, LockSnowflakeGenerator, MonotonicClock,
    SnowflakeGenerator, SnowflakeId, SystemClock, TimeSource,
};
use telemetry::init_telemetry;

type SharedClock = Arc<dyn TimeSource + Send + Sync>;
type SharedGenerator = Box<dyn SnowflakeGenerator + Send + Sync>;

/// How many clock regressions a single issuance waits out before failing.
const REGRESSION_RETRIES: u32 = 3;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    init_telemetry()?;
    let config = CliConfig::try_from(args)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match &config.command {
        Command::Generate {
            count,
            threads,
            padded,
        } => {
            let generator = build_generator(&config)?;
            for id in generate(generator.as_ref(), *count, *threads)? {
                if *padded {
                    writeln!(out, "{}", id.to_padded_string())?;
                } else {
                    writeln!(out, "{id}")?;
                }
            }
        }
        Command::Decode { ids } => decode(&config.layout, ids, &mut out)?,
        Command::Layout => print_layout(&config.layout, &mut out)?,
    }

    out.flush()?;
    Ok(())
}

fn build_generator(config: &CliConfig) -> anyhow::Result<SharedGenerator> {
    let clock: SharedClock = match config.clock {
        ClockKind::System => Arc::new(SystemClock),
        ClockKind::Monotonic => Arc::new(MonotonicClock::new()),
    };

    let generator: SharedGenerator = match config.generator {
        GeneratorKind::Lock => Box::new(LockSnowflakeGenerator::with_layout(
            config.layout,
            config.worker_id,
            config.datacenter_id,
            clock,
        )?),
        GeneratorKind::Atomic => Box::new(AtomicSnowflakeGenerator::with_layout(
            config.layout,
            config.worker_id,
            config.datacenter_id,
            clock,
        )?),
    };
    Ok(generator)
}

/// Mints `count` IDs across `threads` threads sharing `generator` and
/// returns them in ascending order.
fn generate(
    generator: &(dyn SnowflakeGenerator + Send + Sync),
    count: usize,
    threads: usize,
) -> anyhow::Result<Vec<SnowflakeId>> {
    let per_thread = count / threads;
    let remainder = count % threads;

    let batches = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let n = per_thread + usize::from(i < remainder);
                s.spawn(move || mint(generator, n))
            })
            .collect();

        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(batch) => batch,
                Err(_) => Err(anyhow!("minting thread panicked")),
            })
            .collect::<anyhow::Result<Vec<_>>>()
    })?;

    let mut ids: Vec<_> = batches.into_iter().flatten().collect();
    ids.sort_unstable();
    Ok(ids)
}

fn mint(generator: &dyn SnowflakeGenerator, n: usize) -> anyhow::Result<Vec<SnowflakeId>> {
    let mut ids = Vec::with_capacity(n);
    for _ in 0..n {
        ids.push(next_id(generator)?);
    }
    Ok(ids)
}

/// Issues one ID, sleeping through short clock regressions.
fn next_id(generator: &dyn SnowflakeGenerator) -> anyhow::Result<SnowflakeId> {
    let mut attempts = 0;
    loop {
        match generator.try_next_id() {
            Err(Error::ClockRegression { drift_ms }) if attempts < REGRESSION_RETRIES => {
                attempts += 1;
                tracing::warn!(drift_ms, attempts, "waiting for the clock to catch up");
                thread::sleep(Duration::from_millis(drift_ms));
            }
            result => return result.context("failed to mint id"),
        }
    }
}

fn decode(layout: &Layout, ids: &[u64], out: &mut impl Write) -> anyhow::Result<()> {
    for &raw in ids {
        let id = SnowflakeId::try_from(raw).with_context(|| format!("cannot decode {raw}"))?;
        let parts = layout.decompose(id);
        writeln!(
            out,
            "{id} timestamp={} datacenter={} worker={} sequence={}",
            parts.timestamp, parts.datacenter_id, parts.worker_id, parts.sequence
        )?;
    }
    Ok(())
}

fn print_layout(layout: &Layout, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(out, "epoch_ms={}", layout.epoch_millis())?;
    writeln!(
        out,
        "timestamp bits={} shift={} max_ms={}",
        Layout::TIMESTAMP_BITS,
        Layout::TIMESTAMP_SHIFT,
        layout.max_timestamp()
    )?;
    writeln!(
        out,
        "datacenter bits={} shift={} max={}",
        layout.datacenter_bits(),
        layout.datacenter_shift(),
        layout.max_datacenter_id()
    )?;
    writeln!(
        out,
        "worker bits={} shift={} max={}",
        layout.worker_bits(),
        layout.worker_shift(),
        layout.max_worker_id()
    )?;
    writeln!(
        out,
        "sequence bits={} shift=0 max={}",
        layout.sequence_bits(),
        layout.max_sequence()
    )?;
    Ok(())
}
