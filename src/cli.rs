//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::dashboard::queries::is_valid_identifier;
use crate::report::OutputFormat;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// SubPulse - real-time subscriber analytics over Apache Pinot
///
/// Serves an interactive dashboard of subscriber insights backed by
/// aggregate queries against a Pinot broker, or renders it once to a file.
///
/// Examples:
///   subpulse --broker-url http://localhost:8099
///   subpulse --broker-url http://pinot:8099 --table topic5 --bind 0.0.0.0:8501
///   subpulse --render dashboard.html --subscription PREMIUM
///   subpulse --render report.json --format json
///   subpulse --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Pinot broker base URL
    ///
    /// Can also be set via SUBPULSE_BROKER_URL or .subpulse.toml.
    #[arg(long, value_name = "URL", env = "SUBPULSE_BROKER_URL")]
    pub broker_url: Option<String>,

    /// Pinot table holding subscriber events
    #[arg(short, long, value_name = "NAME")]
    pub table: Option<String>,

    /// Address the dashboard server listens on
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .subpulse.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Broker request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum number of cached query results
    #[arg(long, value_name = "COUNT")]
    pub cache_entries: Option<u64>,

    /// Seconds a cached query result stays valid
    #[arg(long, value_name = "SECS")]
    pub cache_ttl: Option<u64>,

    /// Render the dashboard once to this file instead of serving it
    #[arg(long, value_name = "FILE")]
    pub render: Option<PathBuf>,

    /// Subscription type to filter by when rendering (default: All)
    #[arg(long, value_name = "TYPE", requires = "render")]
    pub subscription: Option<String>,

    /// Output format for --render (html, json; default: html)
    #[arg(long, value_name = "FORMAT", requires = "render")]
    pub format: Option<OutputFormat>,

    /// Generate a default .subpulse.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.broker_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Broker URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref table) = self.table {
            if !is_valid_identifier(table) {
                return Err(format!("Invalid table name: {}", table));
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(entries) = self.cache_entries {
            if entries == 0 {
                return Err("Cache must hold at least 1 entry".to_string());
            }
        }

        if let Some(ttl) = self.cache_ttl {
            if ttl == 0 {
                return Err("Cache TTL must be at least 1 second".to_string());
            }
        }

        if let Some(ref path) = self.render {
            if path.is_dir() {
                return Err(format!("Render target is a directory: {}", path.display()));
            }
        }

        Ok(())
    }

    /// The format used by --render.
    pub fn output_format(&self) -> OutputFormat {
        self.format.unwrap_or_default()
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
