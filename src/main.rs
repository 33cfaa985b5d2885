// Event Quota - CLI Entry Point
//
// Inspect and update per-bucket event histories from the shell:
// - record events
// - query the Nth-last event
// - dump a history
// - evaluate a quota policy

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use event_quota::config::Config;
use event_quota::logging;
use event_quota::quota::{EventQuotaTracker, QuotaPolicy, QuotaRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Event Quota: durable event histories for quota checks
#[derive(Parser, Debug)]
#[command(name = "event-quota")]
#[command(version)]
#[command(about = "Durable event histories for quota and frequency checks", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the bucket histories (overrides configuration)
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record an event in a bucket
    Record {
        /// Quota bucket name
        bucket: String,

        /// Monotonic timestamp of the event
        #[arg(allow_negative_numbers = true)]
        timestamp: i64,
    },
    /// Print the timestamp of the Nth most recent event
    Nth {
        /// Quota bucket name
        bucket: String,

        /// 1 is the most recent event
        n: usize,
    },
    /// Print every recorded timestamp in a bucket
    Dump {
        /// Quota bucket name
        bucket: String,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Check whether an event at NOW is within quota
    Check {
        /// Quota bucket name
        bucket: String,

        /// Current monotonic time
        #[arg(allow_negative_numbers = true)]
        now: i64,

        /// Events allowed per window (overrides configuration)
        #[arg(long)]
        max_events: Option<usize>,

        /// Window length in milliseconds (overrides configuration)
        #[arg(long)]
        window_ms: Option<i64>,

        /// Record the event when it is within quota
        #[arg(long)]
        admit: bool,
    },
    /// List buckets with a stored history
    Buckets,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    if let Some(dir) = &args.storage_dir {
        config.storage.dir = dir.clone();
        config.validate()?;
    }

    logging::init(&config.logging, args.verbose)?;
    debug!("Using storage directory {:?}", config.storage.dir);

    let registry = QuotaRegistry::new(&config.storage.dir);
    run(args.command, &registry, &config)
}

fn run(command: Commands, registry: &QuotaRegistry, config: &Config) -> Result<()> {
    match command {
        Commands::Record { bucket, timestamp } => {
            let tracker = open(registry, &bucket)?;
            if tracker.record_event(timestamp)? {
                info!(bucket = %bucket, timestamp, "Event recorded");
                println!("recorded {}", timestamp);
            } else {
                println!("ignored {} (not later than last event)", timestamp);
            }
        }
        Commands::Nth { bucket, n } => {
            let tracker = open(registry, &bucket)?;
            match tracker.nth_last_event_time(n) {
                Some(ts) => println!("{}", ts),
                None => println!("absent"),
            }
        }
        Commands::Dump { bucket, json } => {
            let tracker = open(registry, &bucket)?;
            if json {
                let snapshot = serde_json::to_string_pretty(&tracker.snapshot())
                    .context("Failed to serialize history")?;
                println!("{}", snapshot);
            } else {
                print!("{}", tracker.dump());
            }
        }
        Commands::Check {
            bucket,
            now,
            max_events,
            window_ms,
            admit,
        } => {
            let defaults = config.policy.to_policy();
            let policy = QuotaPolicy::new(
                max_events.unwrap_or(defaults.max_events),
                window_ms.unwrap_or(defaults.window_ms),
            );
            if policy.window_ms <= 0 {
                anyhow::bail!("Quota window must be > 0 ms");
            }

            let tracker = open(registry, &bucket)?;
            let decision = if admit {
                policy.admit(&tracker, now)?
            } else {
                policy.check(&tracker, now)
            };

            if admit && decision.allowed && !decision.recorded {
                println!("ignored {} (not later than last event)", now);
            } else if decision.allowed {
                println!("allowed (remaining {})", decision.remaining);
            } else {
                match decision.retry_at {
                    Some(at) => println!("denied (retry at {})", at),
                    None => println!("denied"),
                }
            }
            if decision.recorded {
                info!(bucket = %bucket, now, "Event admitted and recorded");
            }
        }
        Commands::Buckets => {
            for bucket in registry.stored_buckets()? {
                println!("{}", bucket);
            }
        }
    }

    Ok(())
}

fn open(registry: &QuotaRegistry, bucket: &str) -> Result<Arc<EventQuotaTracker>> {
    registry
        .tracker(bucket)
        .with_context(|| format!("Failed to open quota bucket '{}'", bucket))
}
