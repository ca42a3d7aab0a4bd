//! FlashHash demo
//!
//! Starts an in-process cluster, fills one hash through the command adapter
//! and walks it with the HSCAN cursor, reporting how many pages it took.

use anyhow::Context;
use bytes::Bytes;
use flashhash::{ClusterConfig, MemoryCluster, ScanOptions};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Demo configuration
struct Config {
    /// Number of cluster nodes
    nodes: usize,
    /// Number of fields written to the demo hash
    fields: usize,
    /// COUNT hint for each scan page
    count: Option<u64>,
    /// MATCH pattern for the scan
    pattern: Option<String>,
    /// Log at debug level
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nodes: ClusterConfig::default().nodes,
            fields: 1000,
            count: Some(100),
            pattern: None,
            verbose: false,
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
                "--nodes" | "-n" => {
                    config.nodes = parse_value(&args, i, "--nodes");
                    i += 2;
                }
                "--fields" | "-f" => {
                    config.fields = parse_value(&args, i, "--fields");
                    i += 2;
                }
                "--count" | "-c" => {
                    config.count = Some(parse_value(&args, i, "--count"));
                    i += 2;
                }
                "--match" | "-m" => {
                    config.pattern = Some(parse_value(&args, i, "--match"));
                    i += 2;
                }
                "--verbose" => {
                    config.verbose = true;
                    i += 1;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("FlashHash version {}", flashhash::VERSION);
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

    fn scan_options(&self) -> ScanOptions {
        let mut options = ScanOptions::new();
        if let Some(pattern) = &self.pattern {
            options = options.pattern(pattern.clone());
        }
        if let Some(count) = self.count {
            options = options.count(count);
        }
        options
    }
}

/// Parses the value following the flag at `i`, exiting on a missing or bad value.
fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    let Some(raw) = args.get(i + 1) else {
        eprintln!("Error: {} requires a value", flag);
        std::process::exit(1);
    };
    raw.parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid value for {}: {}", flag, raw);
        std::process::exit(1);
    })
}

fn print_help() {
    println!(
        r#"
FlashHash - cluster hash commands with a resumable scan cursor

USAGE:
    flashhash [OPTIONS]

OPTIONS:
    -n, --nodes <N>        Number of in-process cluster nodes (default: 3)
    -f, --fields <N>       Number of fields to write (default: 1000)
    -c, --count <N>        COUNT hint per scan page (default: 100)
    -m, --match <PATTERN>  Only scan fields matching PATTERN
        --verbose          Log every page fetch
    -v, --version          Print version information
    -h, --help             Print this help message

ENVIRONMENT:
    RUST_LOG               Log filter, e.g. RUST_LOG=flashhash=trace

EXAMPLES:
    flashhash --fields 100000 --count 500
    flashhash --match "field:1*"
"#
    );
}

fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    let default_level = if config.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cluster = MemoryCluster::with_config(ClusterConfig {
        nodes: config.nodes,
        ..ClusterConfig::default()
    });
    info!(nodes = cluster.config().nodes, "cluster started");

    let connection = cluster.connect();
    let hash = connection.hash_commands();
    let key = b"demo:hash";

    let entries: HashMap<Bytes, Bytes> = (0..config.fields)
        .map(|i| {
            (
                Bytes::from(format!("field:{}", i)),
                Bytes::from(format!("value:{}", i)),
            )
        })
        .collect();
    hash.hmset(key, &entries).context("failed to populate the demo hash")?;
    info!(fields = hash.hlen(key)?, "hash populated");

    let started = Instant::now();
    let mut cursor = hash.hscan(key, &config.scan_options())?;
    let mut bytes = 0usize;
    while let Some((field, value)) = cursor.next_entry().context("scan failed")? {
        debug!(field = %String::from_utf8_lossy(&field), "entry");
        bytes += field.len() + value.len();
    }

    info!(
        entries = cursor.position(),
        pages = cursor.fetch_count(),
        bytes,
        elapsed = ?started.elapsed(),
        "scan complete"
    );

    let stats = cluster.stats();
    info!(
        requests = cluster.requests(),
        bytes_sent = stats.bytes_sent.load(std::sync::atomic::Ordering::Relaxed),
        bytes_received = stats.bytes_received.load(std::sync::atomic::Ordering::Relaxed),
        "cluster statistics"
    );

    Ok(())
}
