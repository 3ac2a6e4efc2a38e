//! Noisewake main entry point
//!
//! This is the command-line interface for the Noisewake traffic generator.

use anyhow::Context;
use clap::Parser;
use noisewake::churn::{RetryPolicy, SwarmDescriptor};
use noisewake::config::{compute_config_hash, load_config_or_default, validate, Config};
use noisewake::engine;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Noisewake: synthetic traffic generator
///
/// Noisewake sweeps a growing set of URLs with HTTP and WebSocket probes
/// under rotating identities, checkpoints the discovered URLs back into its
/// configuration file, and churns through a peer swarm in the background.
#[derive(Parser, Debug)]
#[command(name = "noisewake")]
#[command(version)]
#[command(about = "A synthetic traffic generator", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file (also rewritten with the frontier)
    #[arg(long, value_name = "PATH", default_value = "config.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Load and check the configuration, print the plan, and exit
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config_or_default(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if let Ok(hash) = compute_config_hash(&cli.config) {
        tracing::info!("Configuration loaded (hash: {})", hash);
    }

    for warning in validate(&config) {
        tracing::warn!("{}", warning);
    }

    if cli.dry_run {
        handle_dry_run(&config, &cli.config);
        return Ok(());
    }

    let summary = engine::run(config, &cli.config)
        .await
        .context("traffic generation failed to start")?;

    tracing::info!(
        "Shut down cleanly (frontier: {}, churn: {})",
        summary
            .frontier_len
            .map(|n| format!("{} URLs", n))
            .unwrap_or_else(|| "unknown".to_string()),
        summary
            .churn
            .map(|r| format!("{:?} after {} iterations", r.exit, r.iterations))
            .unwrap_or_else(|| "unknown".to_string())
    );

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("noisewake=info,warn"),
            1 => EnvFilter::new("noisewake=debug,info"),
            2 => EnvFilter::new("noisewake=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows what a run would do
fn handle_dry_run(config: &Config, config_path: &Path) {
    println!("=== Noisewake Dry Run ===\n");

    println!("Sweeps:");
    println!("  Frontier seed: {} URLs", config.urls.len());
    for url in &config.urls {
        println!("    * {}", url);
    }
    println!("  Identities: {}", config.user_agents.len());
    for identity in &config.user_agents {
        println!("    * {}", identity);
    }
    println!(
        "  Probes per sweep: {}",
        config.urls.len() * config.user_agents.len()
    );
    println!("  Cadence: {:?}", config.sweep_cadence());
    println!("  HTTP timeout: {:?}", config.probe_timeout());
    println!("  WebSocket timeout: {:?}", config.websocket_timeout());
    println!("  Checkpoint: {}", config_path.display());

    let policy = RetryPolicy::from_config(config);
    println!("\nChurn:");
    match config.torrent_link.as_deref().map(SwarmDescriptor::parse) {
        None => println!("  Disabled (no torrent_link)"),
        Some(Err(e)) => println!("  Disabled ({})", e),
        Some(Ok(descriptor)) => {
            println!("  Info hash: {}", descriptor.info_hash_hex());
            if let Some(name) = &descriptor.display_name {
                println!("  Name: {}", name);
            }
            println!("  Trackers: {}", descriptor.trackers.len());
            let dht = config.dht_bootstrap_nodes();
            if dht.is_empty() {
                println!("  DHT: disabled");
            } else {
                println!("  DHT bootstrap: {}", dht.join(", "));
            }
            println!("  Iterations: {}", policy.attempts);
            println!("  Backoff: {:?}", policy.backoff);
            println!(
                "  Gives up after {} consecutive failures",
                policy.failure_threshold
            );
            println!(
                "  Working directory: {}",
                engine::work_dir_for(config_path).display()
            );
        }
    }

    println!("\n✓ Configuration is usable");
}
