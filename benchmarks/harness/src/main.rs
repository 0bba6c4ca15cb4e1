//! shtrace-bench-harness
//!
//! Run small end-to-end benchmarks of the trace log (generate -> store ->
//! read -> prune -> reopen) and append CSV rows into
//! `benchmarks/reports/bench-<unix>.csv`.
//!
//! Usage examples:
//!   cargo run -p shtrace-bench-harness -- --profile configs/profiles/small.toml
//!   cargo run -p shtrace-bench-harness -- --profile configs/profiles/small.toml --compression none

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Deserialize;

use shtrace_core::{CompressionType, TraceCache, TransactionId};
use shtrace_gen::generator::ChainGenerator;
use shtrace_gen::params::GenParams;
use shtrace_log::{TraceLog, TraceLogConfig};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Profile {
    /// Blocks stored per repeat
    blocks: u32,
    /// User transactions per block
    txs_per_block: usize,
    /// Fraction of each block's transactions to prune
    prune_ratio: f64,
    /// Repetitions of the whole pipeline
    repeats: u32,
    /// Generator seed (varied per repeat)
    #[serde(default)]
    seed: u64,
}

fn parse_flag(name: &str, default: &str) -> String {
    let mut it = std::env::args().skip(1);
    while let Some(k) = it.next() {
        if k == format!("--{name}") {
            return it.next().unwrap_or_else(|| default.to_string());
        }
    }
    default.to_string()
}

const fn dur_us(d: Duration) -> u128 {
    d.as_micros()
}

fn main() -> Result<()> {
    let profile_path = PathBuf::from(parse_flag("profile", "configs/profiles/small.toml"));
    let compression: CompressionType = parse_flag("compression", "zlib")
        .parse()
        .map_err(anyhow::Error::msg)?;

    let profile_src = fs::read_to_string(&profile_path)
        .with_context(|| format!("read profile {}", profile_path.display()))?;
    let profile: Profile = toml::from_str(&profile_src).context("parse profile toml")?;
    anyhow::ensure!(
        (0.0..=1.0).contains(&profile.prune_ratio),
        "prune_ratio must be within [0, 1]"
    );
    println!(
        "Profile: blocks={}, txs_per_block={}, prune_ratio={}, repeats={}, compression={compression}",
        profile.blocks, profile.txs_per_block, profile.prune_ratio, profile.repeats
    );

    fs::create_dir_all("benchmarks/reports").context("create reports dir")?;
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before unix epoch")?
        .as_secs();
    let csv_path = PathBuf::from(format!("benchmarks/reports/bench-{ts}.csv"));
    let mut csv = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&csv_path)?;
    writeln!(csv, "timestamp,compression,blocks,txs,repeat,stage,us,extra")?;

    let config = TraceLogConfig {
        compression,
        sync_writes: false,
        ..TraceLogConfig::default()
    };

    for rep in 0..profile.repeats {
        let dir = tempfile::tempdir().context("create scratch log dir")?;
        let mut row = |stage: &str, d: Duration, extra: String| -> Result<()> {
            writeln!(
                csv,
                "{ts},{compression},{},{},{rep},{stage},{},{extra}",
                profile.blocks,
                profile.txs_per_block,
                dur_us(d)
            )?;
            Ok(())
        };

        // 1) generate
        let params = GenParams {
            seed: profile.seed.wrapping_add(u64::from(rep)),
            txs_per_block: profile.txs_per_block,
            ..GenParams::default()
        };
        let t0 = Instant::now();
        let sims: Vec<_> = ChainGenerator::new(params)?
            .take(profile.blocks as usize)
            .collect();
        row("gen", t0.elapsed(), String::new())?;

        // 2) store
        let mut log = TraceLog::open(dir.path(), config.clone())?;
        let mut cache = TraceCache::new();
        let t0 = Instant::now();
        for sim in &sims {
            sim.feed(&mut cache);
            log.store(&(), &mut cache, &sim.block)?;
        }
        row("store", t0.elapsed(), format!("log_bytes={}", log.log_len()))?;

        // 3) read every block
        let t0 = Instant::now();
        let mut traces = 0usize;
        for sim in &sims {
            traces += log.get_traces(sim.block_num())?.len();
        }
        row("read", t0.elapsed(), format!("traces={traces}"))?;

        // 4) prune a prefix of every block
        let t0 = Instant::now();
        let mut pending = 0usize;
        for sim in &sims {
            let ids = &sim.block.transactions;
            let take = (ids.len() as f64 * profile.prune_ratio).round() as usize;
            let mut wanted: HashSet<TransactionId> = ids.iter().take(take).copied().collect();
            log.prune_transactions(sim.block_num(), &mut wanted)?;
            pending += wanted.len();
        }
        row("prune", t0.elapsed(), format!("pending={pending}"))?;
        drop(log);

        // 5) reopen (index load + frame check)
        let t0 = Instant::now();
        let log = TraceLog::open(dir.path(), config.clone())?;
        row("reopen", t0.elapsed(), format!("entries={}", log.len()))?;
    }

    println!("Wrote report → {}", csv_path.display());
    Ok(())
}
