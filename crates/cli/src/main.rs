//! # CLI - timestamp store shell
//!
//! A REPL-style command-line interface for one timestamp store. Reads
//! commands from stdin, runs them against the store, and prints results to
//! stdout. Works interactively or with commands piped in.
//!
//! ## Commands
//!
//! ```text
//! APPEND ts [count]         Append `count` samples (default 1) stamped `ts`
//! BEFORE ts [max]           Newest sample at or before `ts`
//! AFTER ts                  First sample after `ts`
//! GET n                     Timestamp of sample `n`
//! RANGE first last          Timestamps of samples `first..=last`
//! STATS                     Counters and slot residency
//! CLEAR                     Empty the store and truncate its file
//! STRESS samples [readers]  Writer vs readers run on a throwaway store
//! EXIT / QUIT               Delete the cache file and quit
//! ```
//!
//! ## Configuration
//!
//! ```text
//! TSTORE_PATH        Overflow file path        (default: <cache dir>/timestamps.bin)
//! TSTORE_CACHE_DIR   Cache directory           (default: "cache")
//! TSTORE_SLOT_SIZE   Records per slot          (default: 1048576)
//! TSTORE_BLOCK_SIZE  Records per block         (default: 1024)
//! TSTORE_MAX_SAMPLES Sample capacity           (default: 2147483647)
//! TSTORE_LOG         Log filter, to stderr     (default: "info")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ TSTORE_SLOT_SIZE=8 TSTORE_BLOCK_SIZE=2 cargo run -p cli
//! tstore started (path=cache/timestamps.bin, slot_size=8, block_size=2)
//! > APPEND 10 2
//! OK
//! > APPEND 20
//! OK
//! > BEFORE 15
//! 1
//! > RANGE 0 2
//! 10 10 20
//! > EXIT
//! bye
//! ```

mod stress;

use anyhow::Result;
use config::StoreConfig;
use engine::{AcquisitionCounter, RangeCache, TimestampStore};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Reads a configuration value from the environment.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("TSTORE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();

    let config = StoreConfig::from_env()?;
    let counter = Arc::new(AcquisitionCounter::new());
    let mut store = match env_opt("TSTORE_PATH") {
        Some(path) => TimestampStore::open(path, config.clone())?,
        None => TimestampStore::open_in_cache_dir("timestamps", config.clone())?,
    }
    .with_source(counter.clone());

    println!(
        "tstore started (path={}, slot_size={}, block_size={})",
        store.path().display(),
        config.slot_size,
        config.block_size
    );
    println!("Commands: APPEND ts [count] | BEFORE ts [max] | AFTER ts | GET n | RANGE first last");
    println!("          STATS | CLEAR | STRESS samples [readers] | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let mut lines = io::stdin().lock().lines();
    loop {
        match run_session(&store, &counter, &config, &mut lines)? {
            Session::Clear => {
                store.clear();
                counter.reset();
                println!("OK");
                prompt();
            }
            Session::Exit => break,
        }
    }

    store.dispose();
    Ok(())
}

/// Why a session ended.
enum Session {
    /// `CLEAR` needs the store to itself.
    Clear,
    Exit,
}

/// Runs commands until `CLEAR`, `EXIT` or end of input.
///
/// `GET` and `RANGE` share one range cache for the whole session; it is
/// allocated on first use and released when the session ends.
fn run_session(
    store: &TimestampStore,
    counter: &AcquisitionCounter,
    config: &StoreConfig,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<Session> {
    let mut cache: Option<RangeCache<'_>> = None;

    for line in lines.by_ref() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "APPEND" => {
                    let ts = parts.next().and_then(|s| s.parse::<i64>().ok());
                    let count = match parts.next() {
                        Some(s) => s.parse::<u64>().ok(),
                        None => Some(1),
                    };
                    match (ts, count) {
                        (Some(ts), Some(count)) => {
                            if let Some(last) = store.last_timestamp() {
                                if ts < last {
                                    println!("ERR timestamp {} is older than {}", ts, last);
                                    prompt();
                                    continue;
                                }
                            }
                            let before = store.sample_count();
                            store.append_timestamps(ts, count);
                            let added = store.sample_count() - before;
                            counter.add(added);
                            if added == count {
                                println!("OK");
                            } else {
                                println!("ERR store is full");
                            }
                        }
                        _ => println!("ERR usage: APPEND ts [count]"),
                    }
                }
                "BEFORE" => {
                    let ts = parts.next().and_then(|s| s.parse::<i64>().ok());
                    let max = match parts.next() {
                        Some(s) => s.parse::<u64>().ok(),
                        None => Some(store.sample_count().saturating_sub(1)),
                    };
                    match (ts, max) {
                        (Some(ts), Some(max)) => print_sample(store.closest_at_or_before(ts, max)),
                        _ => println!("ERR usage: BEFORE ts [max]"),
                    }
                }
                "AFTER" => match parts.next().and_then(|s| s.parse::<i64>().ok()) {
                    Some(ts) => print_sample(store.closest_after(ts)),
                    None => println!("ERR usage: AFTER ts"),
                },
                "GET" => match parts.next().and_then(|s| s.parse::<u64>().ok()) {
                    Some(n) => {
                        let cache = cache.get_or_insert_with(|| store.create_cache());
                        match store.get_timestamp(n, cache) {
                            Some(ts) => println!("{}", ts),
                            None => println!("(nil)"),
                        }
                    }
                    None => println!("ERR usage: GET n"),
                },
                "RANGE" => {
                    let first = parts.next().and_then(|s| s.parse::<u64>().ok());
                    let last = parts.next().and_then(|s| s.parse::<u64>().ok());
                    match (first, last) {
                        (Some(first), Some(last)) if first <= last => {
                            let cache = cache.get_or_insert_with(|| store.create_cache());
                            let range = store.get_range(first, last, cache);
                            if range.is_empty() {
                                println!("(empty)");
                            } else {
                                let line: Vec<String> = range.iter().map(|t| t.to_string()).collect();
                                println!("{}", line.join(" "));
                            }
                        }
                        _ => println!("ERR usage: RANGE first last"),
                    }
                }
                "STATS" => print_stats(store),
                "CLEAR" => return Ok(Session::Clear),
                "STRESS" => {
                    let samples = parts.next().and_then(|s| s.parse::<u64>().ok());
                    let readers = match parts.next() {
                        Some(s) => s.parse::<usize>().ok(),
                        None => Some(2),
                    };
                    match (samples, readers) {
                        (Some(samples), Some(readers)) => {
                            match stress::run(config.clone(), samples, readers) {
                                Ok(report) => println!("{}", report),
                                Err(e) => println!("ERR stress failed: {}", e),
                            }
                        }
                        _ => println!("ERR usage: STRESS samples [readers]"),
                    }
                }
                "EXIT" | "QUIT" => {
                    println!("bye");
                    return Ok(Session::Exit);
                }
                other => {
                    println!("unknown command: {}", other);
                }
            }
        }

        prompt();
    }

    Ok(Session::Exit)
}

fn prompt() {
    print!("> ");
    io::stdout().flush().ok();
}

fn print_sample(sample: Option<u64>) {
    match sample {
        Some(n) => println!("{}", n),
        None => println!("(none)"),
    }
}

fn print_stats(store: &TimestampStore) {
    let fmt_ts = |t: Option<i64>| t.map_or_else(|| "-".to_string(), |t| t.to_string());
    println!(
        "samples={} records={} first={} last={}",
        store.sample_count(),
        store.record_count(),
        fmt_ts(store.first_timestamp()),
        fmt_ts(store.last_timestamp())
    );
    println!(
        "slots: allocated={} resident={}",
        store.allocated_slot_count(),
        store.resident_slot_count()
    );
    for i in 0..store.allocated_slot_count() {
        if let Some(state) = store.slot_state(i) {
            println!("slot {}: {:?}", i, state);
        }
    }
}
