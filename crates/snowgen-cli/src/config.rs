use core::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use snowgen::{DEFAULT_EPOCH, Layout};

/// Command line arguments for the `snowgen` binary.
///
/// Identity and layout settings are global: they can be given before or after
/// the subcommand, or through environment variables (also read from a `.env`
/// file in the working directory).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "snowgen",
    version,
    about = "Mint and decode coordinator-free 64-bit Snowflake IDs"
)]
pub struct CliArgs {
    /// Worker ID embedded in every minted ID.
    ///
    /// Must be unique per live generator within a datacenter.
    ///
    /// Environment variable: `WORKER_ID`
    #[arg(
        long,
        env = "WORKER_ID",
        default_value_t = 0,
        global = true,
        allow_negative_numbers = true
    )]
    pub worker_id: i64,

    /// Datacenter ID embedded in every minted ID.
    ///
    /// Environment variable: `DATACENTER_ID`
    #[arg(
        long,
        env = "DATACENTER_ID",
        default_value_t = 0,
        global = true,
        allow_negative_numbers = true
    )]
    pub datacenter_id: i64,

    /// Epoch in milliseconds since the Unix epoch.
    ///
    /// Never change this once IDs have been issued under it.
    ///
    /// Environment variable: `EPOCH_MS`
    #[arg(
        long,
        env = "EPOCH_MS",
        default_value_t = DEFAULT_EPOCH.as_millis() as u64,
        global = true
    )]
    pub epoch_ms: u64,

    /// Width of the datacenter field.
    ///
    /// Environment variable: `DATACENTER_BITS`
    #[arg(long, env = "DATACENTER_BITS", default_value_t = 5, global = true)]
    pub datacenter_bits: u8,

    /// Width of the worker field.
    ///
    /// Environment variable: `WORKER_BITS`
    #[arg(long, env = "WORKER_BITS", default_value_t = 5, global = true)]
    pub worker_bits: u8,

    /// Width of the sequence field. The three widths must sum to 22.
    ///
    /// Environment variable: `SEQUENCE_BITS`
    #[arg(long, env = "SEQUENCE_BITS", default_value_t = 12, global = true)]
    pub sequence_bits: u8,

    /// Time source used for minting.
    ///
    /// Environment variable: `CLOCK`
    #[arg(long, env = "CLOCK", value_enum, default_value_t = ClockKind::System, global = true)]
    pub clock: ClockKind,

    /// Generator implementation used for minting.
    ///
    /// Environment variable: `GENERATOR`
    #[arg(
        long,
        env = "GENERATOR",
        value_enum,
        default_value_t = GeneratorKind::Lock,
        global = true
    )]
    pub generator: GeneratorKind,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Mint IDs and print them one per line in ascending order.
    Generate {
        /// Number of IDs to mint.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Number of threads sharing one generator.
        #[arg(short, long, default_value_t = 1)]
        threads: usize,

        /// Print IDs zero-padded to 20 digits.
        #[arg(long, default_value_t = false)]
        padded: bool,
    },
    /// Print the fields of existing IDs.
    Decode {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Print the active layout.
    Layout,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockKind {
    /// Read the operating system clock on every call.
    System,
    /// Anchor to the system clock once, then advance monotonically.
    Monotonic,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    /// One mutex around the whole issuance step.
    Lock,
    /// Lock-free compare-and-swap over a packed state word.
    Atomic,
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub layout: Layout,
    pub worker_id: i64,
    pub datacenter_id: i64,
    pub clock: ClockKind,
    pub generator: GeneratorKind,
    pub command: Command,
}

impl TryFrom<CliArgs> for CliConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let layout = Layout::new(
            Duration::from_millis(args.epoch_ms),
            args.datacenter_bits,
            args.worker_bits,
            args.sequence_bits,
        )
        .context("invalid layout")?;

        // Only identity used for minting has to fit the layout.
        if matches!(args.command, Command::Generate { .. }) {
            layout
                .check_worker_id(args.worker_id)
                .context("invalid WORKER_ID")?;
            layout
                .check_datacenter_id(args.datacenter_id)
                .context("invalid DATACENTER_ID")?;
        }

        if let Command::Generate { threads, count, .. } = args.command {
            if threads == 0 {
                bail!("--threads must be greater than 0");
            }
            if threads > count.max(1) {
                bail!("--threads ({threads}) exceeds --count ({count})");
            }
        }

        Ok(Self {
            layout,
            worker_id: args.worker_id,
            datacenter_id: args.datacenter_id,
            clock: args.clock,
            generator: args.generator,
            command: args.command,
        })
    }
}
