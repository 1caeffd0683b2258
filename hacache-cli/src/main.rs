//! hacache CLI
//!
//! Drives a refreshing cache against a simulated slow, flaky source so its
//! behavior can be watched from the terminal.

mod source;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hacache_cache::{CacheConfig, CacheStats, RefreshFailurePolicy, RefreshingCache};

use crate::source::SimulatedSource;

/// hacache - stale-while-revalidate cache playground
#[derive(Parser)]
#[command(name = "hacache")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON config file (defaults come from HACACHE_* environment variables)
    #[arg(short, long, global = true, env = "HACACHE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run concurrent readers against a cache over a simulated source
    Demo {
        /// TTL in milliseconds (overrides config)
        #[arg(long)]
        ttl_ms: Option<u64>,
        /// Failure policy: retry, retry:<ms>, or freeze (overrides config)
        #[arg(long)]
        policy: Option<RefreshFailurePolicy>,
        /// Simulated query latency in milliseconds
        #[arg(long, default_value = "200")]
        latency_ms: u64,
        /// Number of initial load attempts that fail before one succeeds
        #[arg(long, default_value = "0")]
        init_failures: u64,
        /// Fail every Nth refresh (0 disables)
        #[arg(long, default_value = "0")]
        fail_every: u64,
        /// Number of concurrent readers
        #[arg(short, long, default_value = "8")]
        readers: usize,
        /// Pause between reads of one reader, in milliseconds
        #[arg(long, default_value = "20")]
        interval_ms: u64,
        /// How long to run, in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "hacache=debug,info"
    } else {
        "hacache=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Demo {
            ttl_ms,
            policy,
            latency_ms,
            init_failures,
            fail_every,
            readers,
            interval_ms,
            duration,
            json,
        } => {
            let mut config = config;
            if let Some(ttl_ms) = ttl_ms {
                config.ttl_ms = ttl_ms;
            }
            if let Some(policy) = policy {
                config.failure_policy = policy;
            }
            let source = SimulatedSource::new(Duration::from_millis(latency_ms))
                .with_init_failures(init_failures)
                .with_fail_every(fail_every);
            let run = DemoRun {
                readers,
                interval: Duration::from_millis(interval_ms),
                duration: Duration::from_secs(duration),
            };
            cmd_demo(config, source, run, json).await
        }
        Commands::Config => cmd_config(&config),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<CacheConfig> {
    match path {
        Some(path) => CacheConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => CacheConfig::from_env().context("Failed to load config from environment"),
    }
}

/// Reader settings for a demo run.
struct DemoRun {
    readers: usize,
    interval: Duration,
    duration: Duration,
}

/// What one reader observed.
#[derive(Default)]
struct ReaderReport {
    reads: u64,
    last_version: u64,
    slowest_read: Duration,
}

#[derive(Serialize)]
struct DemoSummary {
    stats: CacheStats,
    source_calls: u64,
    reads: u64,
    first_load_ms: u64,
    slowest_read_after_load_us: u64,
    latest_version_seen: u64,
}

/// Run readers against a cache
async fn cmd_demo(config: CacheConfig, source: SimulatedSource, run: DemoRun, json: bool) -> Result<()> {
    config.validate().context("Invalid cache configuration")?;

    if !json {
        println!("{} {}", "⚡ Starting cache:".cyan().bold(), config.name);
        println!("   {} {}ms", "TTL:".dimmed(), config.ttl_ms);
        println!("   {} {}", "Failure policy:".dimmed(), config.failure_policy);
        println!("   {} {}", "Readers:".dimmed(), run.readers);
    }

    let calls = source.call_counter();
    let cache: RefreshingCache<(), _> = RefreshingCache::with_config(config, source, None)?;

    let started = Instant::now();
    cache.wait_initialized().await;
    let first_load = started.elapsed();

    let deadline = tokio::time::Instant::now() + run.duration;
    let handles: Vec<_> = (0..run.readers)
        .map(|_| {
            let cache = cache.clone();
            let interval = run.interval;
            tokio::spawn(async move {
                let mut report = ReaderReport::default();
                while tokio::time::Instant::now() < deadline {
                    let start = Instant::now();
                    report.last_version = cache.get(None).await;
                    report.slowest_read = report.slowest_read.max(start.elapsed());
                    report.reads += 1;
                    tokio::time::sleep(interval).await;
                }
                report
            })
        })
        .collect();

    let pb = if json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(saturating_u64(run.duration.as_millis()))
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {msg}")?
            .progress_chars("#>-"),
    );
    while tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let stats = cache.stats();
        pb.set_position(saturating_u64(started.elapsed().saturating_sub(first_load).as_millis()));
        pb.set_message(format!(
            "{} | refreshes {} | failures {}",
            stats.phase, stats.refreshes, stats.refresh_failures
        ));
    }
    pb.finish_and_clear();

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        reports.push(handle.await.context("Reader task panicked")?);
    }

    let summary = DemoSummary {
        stats: cache.stats(),
        source_calls: calls.load(std::sync::atomic::Ordering::SeqCst),
        reads: reports.iter().map(|r| r.reads).sum(),
        first_load_ms: saturating_u64(first_load.as_millis()),
        slowest_read_after_load_us: saturating_u64(
            reports
                .iter()
                .map(|r| r.slowest_read)
                .max()
                .unwrap_or_default()
                .as_micros(),
        ),
        latest_version_seen: reports.iter().map(|r| r.last_version).max().unwrap_or_default(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_summary(&summary);
    Ok(())
}

fn saturating_u64(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

fn print_summary(summary: &DemoSummary) {
    println!("\n{}", "📈 Results:".green().bold());
    println!("   First load:          {}ms", summary.first_load_ms);
    println!("   Reads served:        {}", summary.reads);
    println!("   Slowest read after:  {}µs", summary.slowest_read_after_load_us);
    println!("   Source calls:        {}", summary.source_calls);
    println!("   Init attempts:       {}", summary.stats.init_attempts);
    println!("   Refreshes:           {}", summary.stats.refreshes);
    println!("   Refresh failures:    {}", summary.stats.refresh_failures);
    println!("   Latest version seen: {}", summary.latest_version_seen);
    println!("   Final phase:         {}", summary.stats.phase);

    if summary.stats.phase == hacache_cache::CachePhase::Frozen {
        println!(
            "\n{}",
            "⚠️  Cache is frozen: a refresh failed under the freeze policy.".yellow().bold()
        );
    }
}

/// Print the effective configuration
fn cmd_config(config: &CacheConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
