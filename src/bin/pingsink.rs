//! pingsink operator tool
//!
//! Verifies bucket access, writes samples by hand, and reads pings and records
//! back from InfluxDB.

use pingsink::clock::{epoch_millis, to_rfc3339_millis};
use pingsink::config::StoreConfig;
use pingsink::store::{MetricsStore, PingSample};
use pingsink::telemetry::init_tracing;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

/// pingsink
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file with an `influx` section
    #[arg(long, env = "PINGSINK_CONFIG")]
    config: Option<PathBuf>,

    /// InfluxDB base URL (overrides the config file)
    #[arg(long, env = "INFLUX_URL")]
    url: Option<String>,

    /// Organization (overrides the config file)
    #[arg(long, env = "INFLUX_ORG")]
    org: Option<String>,

    /// Bucket (overrides the config file)
    #[arg(long, env = "INFLUX_BUCKET")]
    bucket: Option<String>,

    /// Environment variable holding the API token
    #[arg(long, default_value = "INFLUX_TOKEN")]
    token_env_var: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the bucket exists and the token can read it
    Verify,
    /// Write one ping sample; omit --players to record a failed ping
    Ping {
        #[arg(long)]
        ip: String,
        #[arg(long)]
        players: Option<f64>,
    },
    /// Write a player-count record
    Record {
        #[arg(long)]
        ip: String,
        #[arg(long)]
        players: f64,
    },
    /// Print pings from the last N minutes
    Recent {
        #[arg(long, default_value = "10")]
        minutes: i64,
    },
    /// Print the record for a server, promoting a legacy peak if needed
    Lookup {
        #[arg(long)]
        ip: String,
    },
    /// Poll for new pings until interrupted
    Watch {
        #[arg(long, default_value = "10")]
        every_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level, args.json_logs)?;

    let config = load_config(&args)?;
    let store = MetricsStore::new(&config).context("failed to configure InfluxDB store")?;

    match args.command {
        Command::Verify => {
            store.verify_bucket_access().await?;
            println!("bucket \"{}\" is accessible", store.descriptor().bucket);
        }
        Command::Ping { ip, players } => {
            store.write_ping(&ip, epoch_millis(), players);
        }
        Command::Record { ip, players } => {
            store.write_record(&ip, players, epoch_millis());
        }
        Command::Recent { minutes } => {
            let end = epoch_millis();
            let start = end - minutes.max(0) * 60_000;
            for sample in store.query_recent_pings(start, end).await? {
                print_sample(&sample);
            }
        }
        Command::Lookup { ip } => match store.resolve_record(&ip).await? {
            Some(record) => println!(
                "{}\t{}\t{}",
                ip,
                record.player_count,
                to_rfc3339_millis(record.timestamp)
            ),
            None => println!("{}\tno record", ip),
        },
        Command::Watch { every_secs } => watch(&store, every_secs).await,
    }

    store.shutdown().await;
    let stats = store.write_stats();
    if stats.lines_dropped > 0 {
        anyhow::bail!("{} lines were dropped by failed writes", stats.lines_dropped);
    }
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<StoreConfig> {
    let mut config = match &args.config {
        Some(path) => StoreConfig::from_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => StoreConfig::default(),
    };

    if args.url.is_some() {
        config.url = args.url.clone();
    }
    if args.org.is_some() {
        config.org = args.org.clone();
    }
    if args.bucket.is_some() {
        config.bucket = args.bucket.clone();
    }
    if config.token.is_none() && config.token_env_var.is_none() {
        config.token_env_var = Some(args.token_env_var.clone());
    }
    Ok(config)
}

async fn watch(store: &MetricsStore, every_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(every_secs.max(1)));
    let mut since = epoch_millis();

    info!(every_secs, "Watching for new pings");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = epoch_millis();
                match store.query_recent_pings(since, now).await {
                    Ok(samples) => {
                        samples.iter().for_each(print_sample);
                        since = now;
                    }
                    Err(e) => warn!(error = %e, "Ping query failed"),
                }
            }
            _ = signal::ctrl_c() => {
                info!("Interrupted; stopping watch");
                return;
            }
        }
    }
}

fn print_sample(sample: &PingSample) {
    let count = sample
        .player_count
        .map_or_else(|| "-".to_string(), |n| n.to_string());
    println!(
        "{}\t{}\t{}",
        to_rfc3339_millis(sample.timestamp),
        sample.ip,
        count
    );
}
