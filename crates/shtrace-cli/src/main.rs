// crates/shtrace-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use shtrace_core::io::{write_block_traces_auto, BlockTraces};
use shtrace_core::io_jsonl::JsonlTraceWriter;
use shtrace_core::{CompressionType, TraceCache, TransactionId};
use shtrace_gen::generator::ChainGenerator;
use shtrace_gen::params::GenParams;
use shtrace_log::{TraceLog, TraceLogConfig};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "shtrace-cli",
    about = "Transaction-trace history log CLI",
    long_about = "Transaction-trace history log CLI.\n\nUse this tool to fill a log with a synthetic chain, inspect and export stored traces, and prune signatures and context-free data in place.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    /// Log directory (holds the log and index files)
    #[arg(long, global = true, default_value = "trace-log")]
    dir: PathBuf,

    /// TOML config for the log (compression, include_traces, read cache, sync)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Append synthetic blocks to the log.
    Simulate {
        /// Number of blocks to append (>0)
        #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u32).range(1..))]
        blocks: u32,

        /// User transactions per block
        #[arg(long, default_value_t = 8)]
        txs: usize,

        /// Generator seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Override the configured entry compression
        #[arg(long, value_enum)]
        compression: Option<CompressionOpt>,
    },

    /// Print block range, entry count, sizes, and the active config.
    Stat,

    /// Print one block's traces as JSON (or its raw entry as hex).
    Dump {
        /// Block number
        #[arg(long)]
        block: u32,

        /// Print the raw entry bytes instead of decoded traces
        #[arg(long, default_value_t = false)]
        raw: bool,
    },

    /// Export stored blocks to JSON/CBOR (by extension) or JSONL/NDJSON (streamed).
    Export {
        /// Output path
        #[arg(long)]
        out: PathBuf,

        /// First block to export (default: first stored)
        #[arg(long)]
        from: Option<u32>,

        /// Last block to export (default: last stored)
        #[arg(long)]
        to: Option<u32>,
    },

    /// Prune signatures and context-free data of transactions in one block.
    Prune {
        /// Block number
        #[arg(long)]
        block: u32,

        /// Transaction ids (hex); repeatable
        #[arg(long = "id")]
        ids: Vec<String>,

        /// Prune every transaction of the block
        #[arg(long, default_value_t = false, conflicts_with = "ids")]
        all: bool,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CompressionOpt {
    None,
    Zlib,
}

impl From<CompressionOpt> for CompressionType {
    fn from(c: CompressionOpt) -> Self {
        match c {
            CompressionOpt::None => Self::None,
            CompressionOpt::Zlib => Self::Zlib,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.cmd {
        Cmd::Simulate {
            blocks,
            txs,
            seed,
            compression,
        } => simulate(&cli.dir, config, blocks, txs, seed, compression),
        Cmd::Stat => stat(&cli.dir, config),
        Cmd::Dump { block, raw } => dump(&cli.dir, config, block, raw),
        Cmd::Export { out, from, to } => export(&cli.dir, config, &out, from, to),
        Cmd::Prune { block, ids, all } => prune(&cli.dir, config, block, &ids, all),
    }
}

/// Initialize tracing with an env-driven filter (default INFO).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<TraceLogConfig> {
    match path {
        Some(p) => TraceLogConfig::from_toml_file(p),
        None => Ok(TraceLogConfig::default()),
    }
}

fn open_log(dir: &Path, config: TraceLogConfig) -> Result<TraceLog> {
    TraceLog::open(dir, config).with_context(|| format!("opening trace log in {}", dir.display()))
}

fn simulate(
    dir: &Path,
    mut config: TraceLogConfig,
    blocks: u32,
    txs: usize,
    seed: u64,
    compression: Option<CompressionOpt>,
) -> Result<()> {
    if let Some(c) = compression {
        config.compression = c.into();
    }
    let mut log = open_log(dir, config)?;
    let start_block = match log.block_range() {
        Some(r) => r.end().checked_add(1).context("log already reaches the last block number")?,
        None => GenParams::default().start_block,
    };
    let params = GenParams {
        seed,
        start_block,
        txs_per_block: txs,
        ..GenParams::default()
    };
    info!(blocks, txs, seed, start_block, compression = %log.config().compression, "simulating");

    let mut cache = TraceCache::new();
    let mut timestamps = BTreeMap::new();
    let mut traces = 0usize;
    for sim in ChainGenerator::new(params)?.take(blocks as usize) {
        sim.feed(&mut cache);
        timestamps.insert(sim.block.block_num, sim.block.timestamp);
        traces += sim.block.transactions.len() + 1;
        log.store(&timestamps, &mut cache, &sim.block)
            .with_context(|| format!("storing block {}", sim.block_num()))?;
    }

    println!(
        "Simulated {blocks} blocks ({traces} traces) → {} [{} bytes]",
        dir.display(),
        log.log_len()
    );
    Ok(())
}

fn stat(dir: &Path, config: TraceLogConfig) -> Result<()> {
    let log = open_log(dir, config)?;
    match log.block_range() {
        Some(r) => println!("blocks:   {}..={} ({} entries)", r.start(), r.end(), log.len()),
        None => println!("blocks:   (empty)"),
    }
    let payload: u64 = log.records().map(|r| r.length).sum();
    println!("log size: {} bytes ({payload} entry bytes)", log.log_len());
    if let Some(largest) = log.records().max_by_key(|r| r.length) {
        println!("largest:  block {} ({} bytes)", largest.block_num, largest.length);
    }
    println!("config:\n{}", log.config().to_toml_string()?);
    Ok(())
}

fn dump(dir: &Path, config: TraceLogConfig, block: u32, raw: bool) -> Result<()> {
    let mut log = open_log(dir, config)?;
    if raw {
        let Some(entry) = log.entry(block)? else {
            bail!("block {block} is not stored");
        };
        println!("{}", hex::encode(entry));
        return Ok(());
    }
    let traces = log
        .get_traces(block)
        .with_context(|| format!("reading block {block}"))?;
    let out = BlockTraces {
        block_num: block,
        traces,
    };
    println!("{}", serde_json::to_string_pretty(&out).context("serialize traces")?);
    Ok(())
}

fn export(
    dir: &Path,
    config: TraceLogConfig,
    out: &Path,
    from: Option<u32>,
    to: Option<u32>,
) -> Result<()> {
    let mut log = open_log(dir, config)?;
    let Some(range) = log.block_range() else {
        bail!("log in {} is empty", dir.display());
    };
    let lo = from.unwrap_or(*range.start());
    let hi = to.unwrap_or(*range.end());
    if lo > hi {
        bail!("empty export range {lo}..={hi}");
    }
    info!(from = lo, to = hi, out = %out.display(), "exporting");

    let nums: Vec<u32> = log
        .records()
        .map(|r| r.block_num)
        .filter(|n| (lo..=hi).contains(n))
        .collect();

    let streamed = matches!(
        out.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("jsonl" | "ndjson")
    );
    let n = if streamed {
        let mut w = JsonlTraceWriter::create(out)?;
        for block_num in nums {
            let traces = log.get_traces(block_num)?;
            w.write(&BlockTraces { block_num, traces })?;
        }
        w.finish()?
    } else {
        let mut all = Vec::with_capacity(nums.len());
        for block_num in nums {
            let traces = log.get_traces(block_num)?;
            all.push(BlockTraces { block_num, traces });
        }
        write_block_traces_auto(out, &all)
            .with_context(|| format!("writing traces to {}", out.display()))?;
        all.len()
    };

    println!("Exported {n} blocks → {}", out.display());
    Ok(())
}

fn prune(dir: &Path, config: TraceLogConfig, block: u32, ids: &[String], all: bool) -> Result<()> {
    let mut log = open_log(dir, config)?;
    let mut wanted: HashSet<TransactionId> = if all {
        log.get_traces(block)?
            .iter()
            .flat_map(|t| {
                let t = t.as_v0();
                std::iter::once(t.id).chain(t.failed_dtrx_trace.as_deref().map(|f| *f.id()))
            })
            .collect()
    } else {
        ids.iter()
            .map(|s| {
                s.parse::<TransactionId>()
                    .with_context(|| format!("invalid transaction id {s}"))
            })
            .collect::<Result<_>>()?
    };
    if wanted.is_empty() {
        bail!("nothing to prune: pass --id <hex> or --all");
    }

    let requested = wanted.len();
    log.prune_transactions(block, &mut wanted)
        .with_context(|| format!("pruning block {block}"))?;

    println!("Pruned {} of {requested} transactions in block {block}", requested - wanted.len());
    if !all {
        for id in &wanted {
            println!("not found: {id}");
        }
    }
    Ok(())
}
