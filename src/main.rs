use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{RankParams, ServeParams};

#[derive(Parser)]
#[command(
    name = "fastmirror",
    version,
    about = "Probe download mirrors and redirect to the fastest one",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); defaults plus FASTMIRROR_* variables when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh mirror selections periodically and serve redirects
    Serve {
        /// Domain list file of the `all` group
        #[arg(long)]
        file: Option<PathBuf>,

        /// Simultaneous download attempts per host
        #[arg(long)]
        threads: Option<usize>,

        /// Echo requests per latency probe
        #[arg(short = 'c', long)]
        count: Option<u16>,

        /// Timeout per echo request in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Measure the hosts of one domain list once and print the ranking
    Rank {
        /// Domain list file
        file: PathBuf,

        /// Rank by latency only, skipping download sampling
        #[arg(long, default_value = "false")]
        latency_only: bool,

        /// Simultaneous download attempts per host
        #[arg(long)]
        threads: Option<usize>,

        /// Print the ranking as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(cli.config.as_deref())?;
    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());

    // Initialize tracing/logging
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fastmirror starting");

    match cli.command {
        Commands::Serve {
            file,
            threads,
            count,
            timeout,
            port,
        } => {
            tracing::info!(
                file = ?file,
                threads = ?threads,
                count = ?count,
                timeout = ?timeout,
                port = ?port,
                "Starting serve command"
            );
            commands::serve(
                config,
                ServeParams {
                    file,
                    threads,
                    count,
                    timeout,
                    port,
                },
            )
            .await?;
        }

        Commands::Rank {
            file,
            latency_only,
            threads,
            json,
        } => {
            tracing::info!(
                file = %file.display(),
                latency_only = %latency_only,
                "Starting rank command"
            );
            commands::rank(
                config,
                RankParams {
                    file,
                    latency_only,
                    threads,
                    json,
                },
            )
            .await?;
        }
    }

    tracing::info!("fastmirror exiting");
    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("fastmirror=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("fastmirror={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
