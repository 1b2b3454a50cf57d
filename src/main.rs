//! FlashRegion - Concurrent In-Memory Regions with Safe Put Admission
//!
//! This is the main entry point for the FlashRegion driver.
//! It builds a region, runs a concurrent mix of creates, updates, replaces and
//! destroys against it, and reports what the put path did.

use bytes::Bytes;
use flashregion::region::{LocalRegion, PerfStats, PutError, PutRequest, RegionConfig};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Driver configuration
struct Config {
    /// Number of concurrent worker tasks
    workers: usize,
    /// Size of the key space the workers contend on
    keys: usize,
    /// Operations per worker
    ops: usize,
    /// Number of table shards
    shards: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 8,
            keys: 1_000,
            ops: 100_000,
            shards: flashregion::entry::DEFAULT_SHARDS,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--workers" | "-w" => {
                    config.workers = parse_value(&args, i, "--workers");
                    i += 2;
                }
                "--keys" | "-k" => {
                    config.keys = parse_value(&args, i, "--keys");
                    i += 2;
                }
                "--ops" | "-n" => {
                    config.ops = parse_value(&args, i, "--ops");
                    i += 2;
                }
                "--shards" | "-s" => {
                    config.shards = parse_value(&args, i, "--shards");
                    i += 2;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("FlashRegion version {}", flashregion::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    fn region_config(&self) -> RegionConfig {
        RegionConfig {
            shards: self.shards,
            ..RegionConfig::named("driver")
        }
    }
}

/// Parses the positive integer following `args[i]`, exiting on failure.
fn parse_value(args: &[String], i: usize, flag: &str) -> usize {
    let Some(raw) = args.get(i + 1) else {
        eprintln!("Error: {} requires a value", flag);
        std::process::exit(1);
    };

    match raw.parse::<usize>() {
        Ok(value) if value > 0 => value,
        _ => {
            eprintln!("Error: {} expects a positive integer, got '{}'", flag, raw);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"
FlashRegion - Concurrent In-Memory Regions with Safe Put Admission

USAGE:
    flashregion [OPTIONS]

OPTIONS:
    -w, --workers <N>    Concurrent worker tasks (default: 8)
    -k, --keys <N>       Size of the contended key space (default: 1000)
    -n, --ops <N>        Operations per worker (default: 100000)
    -s, --shards <N>     Table shards (default: 64)
    -v, --version        Print version information
    -h, --help           Print this help message

EXAMPLES:
    flashregion                          # 8 workers on 1000 keys
    flashregion --keys 10 --workers 32   # Heavy contention
    RUST_LOG=flashregion=debug flashregion --ops 1000

Each worker cycles through create-only puts, plain puts, replaces,
conditional replaces and destroys, so creates regularly collide with
destroys in flight.
"#
    );
}

/// What one worker saw.
#[derive(Debug, Default, Clone, Copy)]
struct WorkerReport {
    committed: u64,
    declined: u64,
    destroyed: u64,
    lost_old_value: u64,
}

impl WorkerReport {
    fn merge(&mut self, other: WorkerReport) {
        self.committed += other.committed;
        self.declined += other.declined;
        self.destroyed += other.destroyed;
        self.lost_old_value += other.lost_old_value;
    }
}

/// Runs `ops` mixed operations against `region`.
fn run_worker(
    region: &LocalRegion,
    worker: usize,
    keys: usize,
    ops: usize,
) -> anyhow::Result<WorkerReport> {
    let mut report = WorkerReport::default();
    let value = Bytes::from(format!("worker-{}", worker));

    for i in 0..ops {
        let key = Bytes::from(format!("key:{}", (i * 31 + worker * 7) % keys));

        let outcome = match i % 5 {
            0 => region.create(key, value.clone())?,
            1 => region.put(key, value.clone())?,
            2 => region.replace(key, value.clone())?,
            3 => {
                if region.destroy(&key).is_some() {
                    report.destroyed += 1;
                }
                continue;
            }
            _ => {
                let request = PutRequest::new(key, value.clone())
                    .update_only()
                    .overwrite_destroyed()
                    .require_old_value();
                match region.execute(request) {
                    Ok(outcome) => outcome,
                    // The old value was destroyed before it could be read
                    Err(PutError::EntryRemoved { .. }) => {
                        report.lost_old_value += 1;
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        };

        if outcome.is_declined() {
            report.declined += 1;
        } else {
            report.committed += 1;
        }
    }

    debug!(worker, ?report, "worker finished");
    Ok(report)
}

fn log_stats(stats: &PerfStats) {
    info!(
        puts = stats.puts,
        creates = stats.creates,
        updates = stats.updates,
        retries = stats.retries,
        destroys = stats.destroys,
        clear_conflicts = stats.clear_conflicts,
        "region statistics"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging, overridable with RUST_LOG
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let region = Arc::new(LocalRegion::new(config.region_config()));
    info!(
        "Region initialized with {} shards, {} workers on {} keys",
        config.shards, config.workers, config.keys
    );

    let started = Instant::now();

    // One blocking task per worker; the region itself is synchronous
    let handles: Vec<_> = (0..config.workers)
        .map(|worker| {
            let region = Arc::clone(&region);
            let keys = config.keys;
            let ops = config.ops;
            tokio::task::spawn_blocking(move || run_worker(&region, worker, keys, ops))
        })
        .collect();

    let mut total = WorkerReport::default();
    for handle in handles {
        total.merge(handle.await??);
    }

    let elapsed = started.elapsed();
    let operations = (config.workers * config.ops) as f64;
    info!(
        committed = total.committed,
        declined = total.declined,
        destroyed = total.destroyed,
        lost_old_value = total.lost_old_value,
        "Ran {} operations in {:.2?} ({:.0} ops/sec)",
        operations,
        elapsed,
        operations / elapsed.as_secs_f64().max(f64::EPSILON)
    );

    log_stats(&region.stats());

    let removed = region.clear();
    info!("Cleared {} remaining entries", removed);

    Ok(())
}
