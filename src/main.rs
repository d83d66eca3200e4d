use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cosmic_birthday::config::Config;
use cosmic_birthday::crawler::pipeline::FetchTarget;

mod commands;

use commands::lookup::OutputFormat;

#[derive(Parser)]
#[command(
    name = "cosmic-birthday",
    version,
    about = "Moon-phase and eclipse dataset builder with a birthday lookup",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used otherwise
    #[arg(short, long, global = true)]
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
    /// Fetch moon phases and eclipses and write the dataset files
    Fetch {
        /// What to fetch (moon, eclipses, all)
        #[arg(short, long, default_value = "all")]
        target: FetchTarget,

        /// First year to fetch
        #[arg(long)]
        start_year: Option<i32>,

        /// Last year to fetch
        #[arg(long)]
        end_year: Option<i32>,

        /// Years fetched concurrently per batch
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Seconds to wait between batches
        #[arg(long)]
        delay_secs: Option<u64>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip years already fetched according to the checkpoints
        #[arg(long, default_value = "false")]
        resume: bool,

        /// Do not merge the offline eclipse table
        #[arg(long, default_value = "false")]
        no_fallback: bool,
    },

    /// Find moon phases and eclipses on a birthday
    Lookup {
        /// Birth date (YYYY-MM-DD)
        date: String,

        /// Dataset file to read
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Fetch live instead of reading the dataset
        #[arg(long, default_value = "false")]
        live: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Run the local CORS relay
    Relay {
        /// Address to listen on
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Fetch validates once its command-line overrides are applied
    let config = Config::read(cli.config.as_deref())?;

    // Initialize tracing/logging
    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    tracing::info!("cosmic-birthday starting");

    match cli.command {
        Commands::Fetch {
            target,
            start_year,
            end_year,
            batch_size,
            delay_secs,
            output,
            resume,
            no_fallback,
        } => {
            tracing::info!(
                target = %target,
                start_year = ?start_year,
                end_year = ?end_year,
                resume = %resume,
                "Starting fetch command"
            );
            let overrides = commands::fetch::FetchOverrides {
                start_year,
                end_year,
                batch_size,
                delay_secs,
                output,
                no_fallback,
            };
            commands::fetch(config, target, overrides, resume).await?;
        }

        Commands::Lookup {
            date,
            dataset,
            live,
            format,
        } => {
            tracing::info!(date = %date, live = %live, "Starting lookup command");
            config.validate()?;
            commands::lookup(config, &date, dataset, live, format).await?;
        }

        Commands::Relay { bind } => {
            tracing::info!(bind = ?bind, "Starting relay command");
            config.validate()?;
            commands::relay(config, bind).await?;
        }
    }

    tracing::info!("cosmic-birthday completed successfully");
    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => tracing_subscriber::EnvFilter::new("cosmic_birthday=debug,info"),
        Err(_) => tracing_subscriber::EnvFilter::try_new(format!("cosmic_birthday={level},warn"))?,
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}
