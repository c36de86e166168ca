//! SubPulse - real-time subscriber analytics dashboard
//!
//! Queries an Apache Pinot broker for subscriber aggregates and serves
//! them as an interactive dashboard, or renders the dashboard once to a
//! file.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, connection, write failure, etc.)

mod cache;
mod charts;
mod cli;
mod config;
mod dashboard;
mod error;
mod models;
mod pinot;
mod report;
mod server;

use anyhow::{Context, Result};
use cache::CacheConfig;
use cli::Args;
use config::Config;
use dashboard::{Orchestrator, QueryCatalog};
use indicatif::{ProgressBar, ProgressStyle};
use models::FilterSelection;
use pinot::{PinotClient, PinotClientConfig, QueryExecutor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    if let Err(e) = config.validate() {
        eprintln!("Error: Invalid configuration: {:#}", e);
        std::process::exit(1);
    }

    // Initialize logging
    init_logging(&args, &config);

    info!("SubPulse v{}", env!("CARGO_PKG_VERSION"));
    match config_source {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }
    debug!("Arguments: {:?}", args);

    match run(args, config).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("SubPulse failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .subpulse.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to point at your Pinot broker and table.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG` takes precedence when set.
fn init_logging(args: &Args, config: &Config) {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Build the orchestrator and either serve or render once.
async fn run(args: Args, config: Config) -> Result<i32> {
    let catalog = QueryCatalog::new(&config.broker.table)
        .with_context(|| format!("Invalid table name: {}", config.broker.table))?;

    let client = PinotClient::new(PinotClientConfig::from(&config.broker))
        .context("Failed to create broker client")?;

    match client.ping().await {
        Ok(()) => info!("Pinot broker at {} is healthy", client.broker_url()),
        Err(e) => warn!("Pinot broker health check failed: {}", e),
    }

    let cache_config = CacheConfig::from(&config.cache);
    let orchestrator = Arc::new(Orchestrator::new(client, catalog, &cache_config));

    let exit_code = match args.render {
        Some(ref path) => render_once(&orchestrator, &args, path).await?,
        None => {
            server::serve(orchestrator.clone(), config.server.bind).await?;
            0
        }
    };

    // Last reference: releases the broker connection pool.
    drop(orchestrator);
    debug!("Broker connection released");

    Ok(exit_code)
}

/// Handle --render: build one report and write it to disk.
async fn render_once<E: QueryExecutor>(
    orchestrator: &Orchestrator<E>,
    args: &Args,
    path: &Path,
) -> Result<i32> {
    let start_time = Instant::now();
    let selection = FilterSelection::from_param(args.subscription.as_deref());

    let spinner = if args.quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap(),
        );
        pb.set_message(format!(
            "Querying {} (subscription: {})",
            orchestrator.catalog().table(),
            selection
        ));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    };

    let report = orchestrator.build_report(&selection).await;

    if let Some(pb) = spinner {
        pb.finish_with_message("Queries complete");
    }

    report::write_report(&report, args.output_format(), path)?;

    let failed = report.failed_panels();
    let duration = start_time.elapsed().as_secs_f64();

    if !args.quiet {
        println!("\n📊 Dashboard Summary:");
        println!("   Table: {}", report.table_name);
        println!("   Subscription: {}", report.selection);
        println!("   Subscription types: {}", report.filter_values.len());
        println!("   Panels: {} ok, {} failed", report.panels.len() - failed, failed);
        println!("   Duration: {:.1}s", duration);
        println!("\n✅ Dashboard saved to: {}", path.display());
    }

    if failed == report.panels.len() {
        eprintln!("\n⛔ Every panel query failed. Is the broker reachable?");
        return Ok(1);
    }

    Ok(0)
}

/// Load configuration from file or use defaults.
///
/// Returns the config and the file it came from, if any.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Ok((Config::load(config_path)?, Some(config_path.clone())));
    }

    // Try default location
    Ok(match Config::load_default()? {
        Some(config) => (config, Some(PathBuf::from(config::CONFIG_FILE))),
        None => (Config::default(), None),
    })
}
