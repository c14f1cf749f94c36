//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the degree-catalog harvester.

use anyhow::Context;
use catalog_harvest::config::{load_config_with_hash, validate, Config};
use catalog_harvest::crawler::Coordinator;
use catalog_harvest::output::{print_report, JsonlSink};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: a resilient degree-catalog crawler
///
/// Catalog-Harvest fetches every program catalog of the portal for a range
/// of terms, recovers the requirement category of each course table, and
/// writes one JSON-lines file per program and term.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version)]
#[command(about = "A resilient degree-catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Comma-separated term codes to crawl instead of the generated range
    #[arg(long, value_delimiter = ',')]
    terms: Vec<String>,

    /// Parallel crawl workers
    #[arg(long)]
    workers: Option<usize>,

    /// Maximum simultaneous HTTP requests
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Skip minor catalogs
    #[arg(long)]
    skip_minors: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    apply_overrides(&mut config, &cli);
    validate(&config).context("invalid command-line overrides")?;

    if cli.dry_run {
        handle_dry_run(config).await
    } else {
        handle_harvest(config).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
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

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if !cli.terms.is_empty() {
        config.crawl.terms = cli
            .terms
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
    }
    if let Some(workers) = cli.workers {
        config.crawl.workers = workers;
    }
    if let Some(max_in_flight) = cli.max_in_flight {
        config.http.max_in_flight = max_in_flight;
    }
    if cli.skip_minors {
        config.crawl.skip_minors = true;
    }
}

/// Handles the --dry-run mode: resolves the work units without crawling them
async fn handle_dry_run(config: Config) -> anyhow::Result<()> {
    println!("=== Catalog-Harvest Dry Run ===\n");

    println!("Portal: {}", config.portal.base_url);
    println!(
        "Fetch: {} in flight, {} retries, {}s timeout",
        config.http.max_in_flight, config.http.retries, config.http.timeout_secs
    );
    println!("Workers: {}", config.crawl.workers);
    println!("Output: {}\n", config.output.courses_dir);

    let coordinator = Coordinator::new(config)?;
    let terms = coordinator.resolve_terms()?;
    println!("Terms ({}): {}", terms.len(), terms.join(", "));

    let units = coordinator.resolve_major_units(&terms).await?;
    println!("\nMajor units ({}):", units.len());
    for unit in &units {
        println!("  - {}", unit);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config) -> anyhow::Result<()> {
    let sink = JsonlSink::new(&config.output.courses_dir);
    tracing::info!("Writing catalogs under {}", sink.root().display());

    let coordinator = Coordinator::new(config)?;
    match coordinator.run(&sink).await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
